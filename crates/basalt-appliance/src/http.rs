use crate::error::{ApplianceError, Result};
use basalt_core::ReqContext;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// REST API port on the appliance
const API_PORT: u16 = 7717;
/// API version prefix
const API_VERSION: &str = "v2.1";
/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport configuration, derived from the agent config.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub cluster: String,
    pub username: String,
    pub password: String,
    pub ssl: bool,
    pub tenant: String,
    /// Substring in a failure body that marks a create of an
    /// already-present entity.
    pub conflict_marker: String,
}

impl TransportConfig {
    pub fn new(cluster: &str, username: &str, password: &str, ssl: bool, tenant: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            ssl,
            tenant: tenant.to_string(),
            conflict_marker: "ConflictError".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session_key: String,
}

/// HTTP transport with session-key authentication.
///
/// The session key is shared read-many-write-one state; a 401-class
/// response triggers exactly one transparent re-login and retry, after
/// which the failure is surfaced.
pub struct Transport {
    base_url: String,
    config: TransportConfig,
    client: reqwest::Client,
    session_key: RwLock<Option<String>>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let scheme = if config.ssl { "https" } else { "http" };
        let base_url = format!("{}://{}:{}/{}", scheme, config.cluster, API_PORT, API_VERSION);

        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if config.ssl {
            // Appliances commonly run with self-signed management certs
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| ApplianceError::transport(e.to_string()))?;

        Ok(Self {
            base_url,
            config,
            client,
            session_key: RwLock::new(None),
        })
    }

    /// Authenticate and store a fresh session key.
    async fn login(&self) -> Result<String> {
        debug!("Logging in to appliance at {}", self.base_url);
        let resp = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| ApplianceError::transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApplianceError::auth(format!(
                "login returned {}: {}",
                status, body
            )));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| ApplianceError::serialization(e.to_string()))?;

        *self.session_key.write().await = Some(login.session_key.clone());
        Ok(login.session_key)
    }

    async fn current_key(&self) -> Result<String> {
        if let Some(key) = self.session_key.read().await.clone() {
            return Ok(key);
        }
        self.login().await
    }

    async fn send_once(
        &self,
        ctx: &ReqContext,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        key: &str,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(req = ctx.req, tid = %ctx.tid, "{} {}", method, url);

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header("Auth-Token", key)
            .header("X-Tenant", &self.config.tenant)
            .header("X-Trace-Id", &ctx.tid)
            .header("X-Request-Name", ctx.req);
        if let Some(b) = body {
            builder = builder.json(b);
        }
        builder
            .send()
            .await
            .map_err(|e| ApplianceError::transport(e.to_string()))
    }

    /// Issue a request, refreshing the session key once on 401.
    pub async fn request(
        &self,
        ctx: &ReqContext,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let key = self.current_key().await?;
        let mut resp = self.send_once(ctx, &method, path, body.as_ref(), &key).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(req = ctx.req, tid = %ctx.tid, "Session key expired, re-authenticating");
            let key = self.login().await?;
            resp = self.send_once(ctx, &method, path, body.as_ref(), &key).await?;
            if resp.status() == StatusCode::UNAUTHORIZED {
                return Err(ApplianceError::auth(
                    "still unauthorized after session refresh".to_string(),
                ));
            }
        }

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ApplianceError::transport(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApplianceError::not_found(path.to_string()));
        }
        if status == StatusCode::CONFLICT || text.contains(&self.config.conflict_marker) {
            return Err(ApplianceError::conflict(path.to_string()));
        }
        if !status.is_success() {
            return Err(ApplianceError::api(status.as_u16(), text));
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApplianceError::serialization(e.to_string()))
    }

    pub async fn get(&self, ctx: &ReqContext, path: &str) -> Result<Value> {
        self.request(ctx, Method::GET, path, None).await
    }

    pub async fn post(&self, ctx: &ReqContext, path: &str, body: Value) -> Result<Value> {
        self.request(ctx, Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, ctx: &ReqContext, path: &str, body: Value) -> Result<Value> {
        self.request(ctx, Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, ctx: &ReqContext, path: &str) -> Result<Value> {
        self.request(ctx, Method::DELETE, path, None).await
    }
}
