use crate::entities::{
    AclPolicy, AdminState, EndpointInfo, Initiator, Metadata, StorageEndpoint, Volume,
    BLOCK_VOLUME_NAME, STORAGE_ENDPOINT_NAME,
};
use crate::error::{ApplianceError, Result};
use crate::gateway::ApplianceGateway;
use crate::http::Transport;
use async_trait::async_trait;
use basalt_core::{qualify_name, strip_name, ReqContext, VolumeOpts, VOLUME_PREFIX};
use serde_json::{json, Value};
use tracing::debug;

/// Typed wrapper over the appliance REST surface.
pub struct ApplianceClient {
    transport: Transport,
}

impl ApplianceClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|e| ApplianceError::serialization(e.to_string()))
    }

    /// Build the creation body. Exactly one mode applies; precedence is
    /// clone source > template > raw.
    fn creation_body(name: &str, opts: &VolumeOpts) -> Value {
        if !opts.clone_src.is_empty() {
            json!({
                "name": name,
                "clone_source": { "path": format!("/volumes/{}", qualify_name(&opts.clone_src)) },
            })
        } else if !opts.template.is_empty() {
            let template = opts.template.trim_matches('/');
            json!({
                "name": name,
                "template": { "path": format!("/templates/{}", template) },
            })
        } else {
            json!({
                "name": name,
                "storage_endpoints": [{
                    "name": STORAGE_ENDPOINT_NAME,
                    "block_volumes": [{
                        "name": BLOCK_VOLUME_NAME,
                        "size": opts.size,
                        "replica_count": opts.replica,
                        "placement_mode": opts.placement_mode,
                    }],
                }],
            })
        }
    }
}

#[async_trait]
impl ApplianceGateway for ApplianceClient {
    async fn get_volume(&self, ctx: &ReqContext, name: &str) -> Result<Volume> {
        let path = format!("volumes/{}", qualify_name(name));
        Self::decode(self.transport.get(ctx, &path).await?)
    }

    async fn create_volume(&self, ctx: &ReqContext, name: &str, opts: &VolumeOpts) -> Result<()> {
        let qname = qualify_name(name);
        let body = Self::creation_body(&qname, opts);
        match self.transport.post(ctx, "volumes", body).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => {
                debug!(req = ctx.req, tid = %ctx.tid, "Volume {} already present, treating create as success", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn set_performance_policy(
        &self,
        ctx: &ReqContext,
        name: &str,
        iops_max: u64,
        bw_max: u64,
    ) -> Result<()> {
        let path = format!(
            "volumes/{}/storage_endpoints/{}/block_volumes/{}/performance_policy",
            qualify_name(name),
            STORAGE_ENDPOINT_NAME,
            BLOCK_VOLUME_NAME
        );
        let body = json!({
            "total_iops_max": iops_max,
            "total_bandwidth_max": bw_max,
        });
        self.transport.post(ctx, &path, body).await?;
        Ok(())
    }

    async fn put_metadata(&self, ctx: &ReqContext, name: &str, meta: &Metadata) -> Result<()> {
        let path = format!("volumes/{}/metadata", qualify_name(name));
        let body =
            serde_json::to_value(meta).map_err(|e| ApplianceError::serialization(e.to_string()))?;
        self.transport.put(ctx, &path, body).await?;
        Ok(())
    }

    async fn get_metadata(&self, ctx: &ReqContext, name: &str) -> Result<Metadata> {
        let path = format!("volumes/{}/metadata", qualify_name(name));
        Self::decode(self.transport.get(ctx, &path).await?)
    }

    async fn set_admin_state(
        &self,
        ctx: &ReqContext,
        name: &str,
        state: AdminState,
        force: bool,
    ) -> Result<()> {
        let path = format!("volumes/{}", qualify_name(name));
        let body = json!({ "admin_state": state.as_str(), "force": force });
        self.transport.put(ctx, &path, body).await?;
        Ok(())
    }

    async fn delete_volume(&self, ctx: &ReqContext, name: &str) -> Result<()> {
        let path = format!("volumes/{}", qualify_name(name));
        self.transport.delete(ctx, &path).await?;
        Ok(())
    }

    async fn get_storage_endpoint(&self, ctx: &ReqContext, name: &str) -> Result<EndpointInfo> {
        let path = format!(
            "volumes/{}/storage_endpoints/{}",
            qualify_name(name),
            STORAGE_ENDPOINT_NAME
        );
        let se: StorageEndpoint = Self::decode(self.transport.get(ctx, &path).await?)?;
        let info = EndpointInfo::from(&se);
        debug!(
            req = ctx.req, tid = %ctx.tid,
            "Endpoint for {}: iqn={}, portals={:?}, uuid={}",
            name, info.iqn, info.portals, info.volume_uuid
        );
        Ok(info)
    }

    async fn list_volumes(&self, ctx: &ReqContext) -> Result<Vec<String>> {
        let vols: Vec<Volume> = Self::decode(self.transport.get(ctx, "volumes").await?)?;
        let names = vols
            .iter()
            .filter(|v| v.name.starts_with(VOLUME_PREFIX))
            .map(|v| strip_name(&v.name).to_string())
            .collect::<Vec<_>>();
        debug!(req = ctx.req, tid = %ctx.tid, "Found volumes: {:?}", names);
        Ok(names)
    }

    async fn get_initiator(&self, ctx: &ReqContext, id: &str) -> Result<Initiator> {
        let path = format!("initiators/{}", id);
        Self::decode(self.transport.get(ctx, &path).await?)
    }

    async fn create_initiator(&self, ctx: &ReqContext, name: &str, id: &str) -> Result<Initiator> {
        let body = json!({ "name": name, "id": id });
        match self.transport.post(ctx, "initiators", body).await {
            Ok(v) => Self::decode(v),
            Err(e) if e.is_conflict() => {
                debug!(req = ctx.req, tid = %ctx.tid, "Initiator {} already registered, adopting it", id);
                self.get_initiator(ctx, id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn get_acl(&self, ctx: &ReqContext, volume: &str) -> Result<AclPolicy> {
        let path = format!(
            "volumes/{}/storage_endpoints/{}/acl_policy",
            qualify_name(volume),
            STORAGE_ENDPOINT_NAME
        );
        Self::decode(self.transport.get(ctx, &path).await?)
    }

    async fn put_acl(&self, ctx: &ReqContext, volume: &str, acl: &AclPolicy) -> Result<()> {
        let path = format!(
            "volumes/{}/storage_endpoints/{}/acl_policy",
            qualify_name(volume),
            STORAGE_ENDPOINT_NAME
        );
        let body =
            serde_json::to_value(acl).map_err(|e| ApplianceError::serialization(e.to_string()))?;
        self.transport.put(ctx, &path, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_body_raw() {
        let mut opts = VolumeOpts {
            size: 50,
            replica: 2,
            placement_mode: "hybrid".to_string(),
            ..Default::default()
        };
        opts.apply_defaults();
        let body = ApplianceClient::creation_body("BASALT-a", &opts);
        let bv = &body["storage_endpoints"][0]["block_volumes"][0];
        assert_eq!(bv["size"], 50);
        assert_eq!(bv["replica_count"], 2);
        assert_eq!(bv["name"], BLOCK_VOLUME_NAME);
        assert_eq!(body["storage_endpoints"][0]["name"], STORAGE_ENDPOINT_NAME);
    }

    #[test]
    fn test_creation_body_template_beats_raw() {
        let opts = VolumeOpts {
            size: 50,
            template: "/gold/".to_string(),
            ..Default::default()
        };
        let body = ApplianceClient::creation_body("BASALT-a", &opts);
        assert_eq!(body["template"]["path"], "/templates/gold");
        assert!(body.get("storage_endpoints").is_none());
    }

    #[test]
    fn test_creation_body_clone_beats_template() {
        let opts = VolumeOpts {
            template: "gold".to_string(),
            clone_src: "source-vol".to_string(),
            ..Default::default()
        };
        let body = ApplianceClient::creation_body("BASALT-a", &opts);
        assert_eq!(body["clone_source"]["path"], "/volumes/BASALT-source-vol");
        assert!(body.get("template").is_none());
    }
}
