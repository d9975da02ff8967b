use crate::protocol::*;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use basalt_core::{ReqContext, VolumeOpts};
use basalt_host::Orchestrator;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Conventional docker plugin socket path for a driver name.
pub fn socket_path(name: &str) -> PathBuf {
    PathBuf::from(format!("/run/docker/plugins/{}.sock", name))
}

/// Build the plugin router.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Remove", post(remove))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

/// Serve the plugin socket until the token is cancelled.
pub async fn serve(
    listener: UnixListener,
    orchestrator: Arc<Orchestrator>,
    token: CancellationToken,
) -> std::io::Result<()> {
    let app = router(orchestrator);
    info!("Serving volume plugin requests");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            token.cancelled().await;
        })
        .await
}

async fn activate() -> Json<ActivateResponse> {
    Json(ActivateResponse::volume_driver())
}

async fn create(
    State(orch): State<Arc<Orchestrator>>,
    Json(req): Json<CreateRequest>,
) -> Json<ErrResponse> {
    let ctx = ReqContext::new("Create");
    let opts = VolumeOpts::from_map(&req.opts.unwrap_or_default());
    match orch.create(&ctx, &req.name, opts).await {
        Ok(()) => Json(ErrResponse::ok()),
        Err(e) => {
            error!(req = ctx.req, tid = %ctx.tid, "Create failed for {}: {}", req.name, e);
            Json(ErrResponse::error(e))
        }
    }
}

async fn remove(
    State(orch): State<Arc<Orchestrator>>,
    Json(req): Json<RemoveRequest>,
) -> Json<ErrResponse> {
    let ctx = ReqContext::new("Remove");
    match orch.remove(&ctx, &req.name).await {
        Ok(()) => Json(ErrResponse::ok()),
        Err(e) => {
            error!(req = ctx.req, tid = %ctx.tid, "Remove failed for {}: {}", req.name, e);
            Json(ErrResponse::error(e))
        }
    }
}

async fn mount(
    State(orch): State<Arc<Orchestrator>>,
    Json(req): Json<MountRequest>,
) -> Json<MountResponse> {
    let ctx = ReqContext::new("Mount");
    match orch.mount(&ctx, &req.name).await {
        Ok(mountpoint) => Json(MountResponse {
            mountpoint: mountpoint.display().to_string(),
            err: String::new(),
        }),
        Err(e) => {
            error!(req = ctx.req, tid = %ctx.tid, "Mount failed for {}: {}", req.name, e);
            Json(MountResponse {
                mountpoint: String::new(),
                err: e.to_string(),
            })
        }
    }
}

async fn unmount(
    State(orch): State<Arc<Orchestrator>>,
    Json(req): Json<UnmountRequest>,
) -> Json<ErrResponse> {
    let ctx = ReqContext::new("Unmount");
    match orch.unmount(&ctx, &req.name).await {
        Ok(()) => Json(ErrResponse::ok()),
        Err(e) => {
            error!(req = ctx.req, tid = %ctx.tid, "Unmount failed for {}: {}", req.name, e);
            Json(ErrResponse::error(e))
        }
    }
}

async fn get(
    State(orch): State<Arc<Orchestrator>>,
    Json(req): Json<GetRequest>,
) -> Json<GetResponse> {
    let ctx = ReqContext::new("Get");
    match orch.get(&ctx, &req.name).await {
        Ok(mountpoint) => Json(GetResponse {
            volume: Some(VolumeInfo {
                name: req.name,
                mountpoint: mountpoint.display().to_string(),
                status: HashMap::new(),
            }),
            err: String::new(),
        }),
        Err(e) => {
            error!(req = ctx.req, tid = %ctx.tid, "Get failed for {}: {}", req.name, e);
            Json(GetResponse {
                volume: None,
                err: e.to_string(),
            })
        }
    }
}

async fn list(State(orch): State<Arc<Orchestrator>>) -> Json<ListResponse> {
    let ctx = ReqContext::new("List");
    match orch.list(&ctx).await {
        Ok(entries) => Json(ListResponse {
            volumes: entries
                .into_iter()
                .map(|e| VolumeInfo {
                    name: e.name,
                    mountpoint: e.mountpoint.display().to_string(),
                    status: HashMap::new(),
                })
                .collect(),
            err: String::new(),
        }),
        Err(e) => {
            error!(req = ctx.req, tid = %ctx.tid, "List failed: {}", e);
            Json(ListResponse {
                volumes: vec![],
                err: e.to_string(),
            })
        }
    }
}

async fn path(
    State(orch): State<Arc<Orchestrator>>,
    Json(req): Json<PathRequest>,
) -> Json<MountResponse> {
    Json(MountResponse {
        mountpoint: orch.mount_point(&req.name).display().to_string(),
        err: String::new(),
    })
}

async fn capabilities() -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse::global())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use basalt_appliance::MockAppliance;
    use basalt_host::{InitiatorManager, MockHost, OrchestratorConfig};
    use http_body_util::BodyExt;
    use std::io::Write;
    use tower::util::ServiceExt;

    fn test_router() -> (Router, tempfile::NamedTempFile) {
        let appliance = Arc::new(MockAppliance::new());
        let host = Arc::new(MockHost::new());
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "InitiatorName=iqn.1993-08.org.debian:01:test").unwrap();
        let initiators = InitiatorManager::with_file(appliance.clone(), file.path());
        let orch = Arc::new(Orchestrator::new(
            appliance,
            host,
            initiators,
            OrchestratorConfig::default(),
        ));
        (router(orch), file)
    }

    async fn post_json(router: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let resp = router
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    #[tokio::test]
    async fn test_activate_advertises_volume_driver() {
        let (router, _f) = test_router();
        let (status, body) = post_json(router, "/Plugin.Activate", "{}").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Implements"][0], "VolumeDriver");
    }

    #[tokio::test]
    async fn test_capabilities_scope_is_global() {
        let (router, _f) = test_router();
        let (_, body) = post_json(router, "/VolumeDriver.Capabilities", "{}").await;
        assert_eq!(body["Capabilities"]["Scope"], "global");
    }

    #[tokio::test]
    async fn test_create_then_path_round_trip() {
        let (router, _f) = test_router();
        let (_, body) = post_json(
            router.clone(),
            "/VolumeDriver.Create",
            r#"{"Name": "data", "Opts": {"size": "50"}}"#,
        )
        .await;
        assert_eq!(body["Err"], "");

        let (_, body) = post_json(router, "/VolumeDriver.Path", r#"{"Name": "data"}"#).await;
        assert_eq!(body["Mountpoint"], "/mnt/data");
    }

    #[tokio::test]
    async fn test_get_of_missing_volume_reports_err_string() {
        let (router, _f) = test_router();
        let (status, body) = post_json(router, "/VolumeDriver.Get", r#"{"Name": "ghost"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["Err"].as_str().unwrap().contains("not found"));
        assert!(body.get("Volume").is_none());
    }

    #[tokio::test]
    async fn test_list_reports_created_volumes() {
        let (router, _f) = test_router();
        post_json(
            router.clone(),
            "/VolumeDriver.Create",
            r#"{"Name": "a", "Opts": null}"#,
        )
        .await;
        let (_, body) = post_json(router, "/VolumeDriver.List", "{}").await;
        assert_eq!(body["Volumes"][0]["Name"], "a");
        assert_eq!(body["Volumes"][0]["Mountpoint"], "/mnt/a");
    }
}
