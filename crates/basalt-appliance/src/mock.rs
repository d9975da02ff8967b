use crate::entities::{AclPolicy, AdminState, EndpointInfo, Initiator, Metadata, Volume};
use crate::error::{ApplianceError, Result};
use crate::gateway::ApplianceGateway;
use async_trait::async_trait;
use basalt_core::{qualify_name, strip_name, ReqContext, VolumeOpts, VOLUME_PREFIX};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// How a mock volume was created, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateMode {
    Raw,
    Template(String),
    Clone(String),
}

/// In-memory record of a volume on the mock array.
#[derive(Debug, Clone)]
pub struct MockVolume {
    pub opts: VolumeOpts,
    pub mode: CreateMode,
    pub admin_state: AdminState,
    pub metadata: Metadata,
    pub acl: AclPolicy,
    pub volume_uuid: String,
    pub performance: Option<(u64, u64)>,
    /// Remaining get_volume calls that still report offline after an
    /// online transition (simulates slow array convergence).
    online_after: usize,
    /// Remaining get_storage_endpoint calls returning an empty result.
    endpoint_after: usize,
}

#[derive(Default)]
struct Inner {
    volumes: HashMap<String, MockVolume>,
    initiators: HashMap<String, Initiator>,
}

/// In-memory appliance for testing the orchestrator without an array.
///
/// Mirrors the gateway's external contract: create of a present entity is
/// a no-op success, deletion of a missing entity is NotFound.
pub struct MockAppliance {
    inner: Arc<RwLock<Inner>>,
    /// Portals every endpoint publishes
    portals: Vec<String>,
    /// Polls an online transition takes to become visible
    online_lag: usize,
    /// Polls an endpoint takes to publish access coordinates
    endpoint_lag: usize,
    /// When set, delete_volume of a present volume fails with this status
    fail_delete_status: Option<u16>,
}

impl MockAppliance {
    pub fn new() -> Self {
        Self::with_portals(vec!["172.16.0.10".to_string()])
    }

    pub fn with_portals(portals: Vec<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            portals,
            online_lag: 0,
            endpoint_lag: 0,
            fail_delete_status: None,
        }
    }

    pub fn with_online_lag(mut self, polls: usize) -> Self {
        self.online_lag = polls;
        self
    }

    pub fn with_endpoint_lag(mut self, polls: usize) -> Self {
        self.endpoint_lag = polls;
        self
    }

    pub fn with_failing_delete(mut self, status: u16) -> Self {
        self.fail_delete_status = Some(status);
        self
    }

    pub async fn volume(&self, name: &str) -> Option<MockVolume> {
        self.inner.read().await.volumes.get(&qualify_name(name)).cloned()
    }

    pub async fn volume_uuid(&self, name: &str) -> Option<String> {
        self.volume(name).await.map(|v| v.volume_uuid)
    }

    pub async fn initiator_count(&self) -> usize {
        self.inner.read().await.initiators.len()
    }

    /// Seed a pre-existing ACL entry, as another host would have left.
    pub async fn seed_acl_entry(&self, name: &str, path: &str) {
        let mut inner = self.inner.write().await;
        if let Some(v) = inner.volumes.get_mut(&qualify_name(name)) {
            v.acl.initiators.push(crate::entities::InitiatorRef {
                path: path.to_string(),
            });
        }
    }
}

impl Default for MockAppliance {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApplianceGateway for MockAppliance {
    async fn get_volume(&self, _ctx: &ReqContext, name: &str) -> Result<Volume> {
        let qname = qualify_name(name);
        let mut inner = self.inner.write().await;
        let vol = inner
            .volumes
            .get_mut(&qname)
            .ok_or_else(|| ApplianceError::not_found(&qname))?;

        let admin_state = if vol.online_after > 0 {
            vol.online_after -= 1;
            AdminState::Offline
        } else {
            vol.admin_state
        };

        Ok(Volume {
            name: qname,
            admin_state: admin_state.as_str().to_string(),
            storage_endpoints: vec![],
        })
    }

    async fn create_volume(&self, _ctx: &ReqContext, name: &str, opts: &VolumeOpts) -> Result<()> {
        let qname = qualify_name(name);
        let mut inner = self.inner.write().await;
        if inner.volumes.contains_key(&qname) {
            debug!("Mock: volume {} already present", qname);
            return Ok(());
        }
        let mode = if !opts.clone_src.is_empty() {
            CreateMode::Clone(opts.clone_src.clone())
        } else if !opts.template.is_empty() {
            CreateMode::Template(opts.template.clone())
        } else {
            CreateMode::Raw
        };
        inner.volumes.insert(
            qname.clone(),
            MockVolume {
                opts: opts.clone(),
                mode,
                admin_state: AdminState::Offline,
                metadata: Metadata::new(),
                acl: AclPolicy::default(),
                volume_uuid: Uuid::new_v4().to_string(),
                performance: None,
                online_after: 0,
                endpoint_after: self.endpoint_lag,
            },
        );
        debug!("Mock: volume {} created", qname);
        Ok(())
    }

    async fn set_performance_policy(
        &self,
        _ctx: &ReqContext,
        name: &str,
        iops_max: u64,
        bw_max: u64,
    ) -> Result<()> {
        let qname = qualify_name(name);
        let mut inner = self.inner.write().await;
        let vol = inner
            .volumes
            .get_mut(&qname)
            .ok_or_else(|| ApplianceError::not_found(&qname))?;
        vol.performance = Some((iops_max, bw_max));
        Ok(())
    }

    async fn put_metadata(&self, _ctx: &ReqContext, name: &str, meta: &Metadata) -> Result<()> {
        let qname = qualify_name(name);
        let mut inner = self.inner.write().await;
        let vol = inner
            .volumes
            .get_mut(&qname)
            .ok_or_else(|| ApplianceError::not_found(&qname))?;
        vol.metadata = meta.clone();
        Ok(())
    }

    async fn get_metadata(&self, _ctx: &ReqContext, name: &str) -> Result<Metadata> {
        let qname = qualify_name(name);
        let inner = self.inner.read().await;
        inner
            .volumes
            .get(&qname)
            .map(|v| v.metadata.clone())
            .ok_or_else(|| ApplianceError::not_found(&qname))
    }

    async fn set_admin_state(
        &self,
        _ctx: &ReqContext,
        name: &str,
        state: AdminState,
        _force: bool,
    ) -> Result<()> {
        let qname = qualify_name(name);
        let mut inner = self.inner.write().await;
        let vol = inner
            .volumes
            .get_mut(&qname)
            .ok_or_else(|| ApplianceError::not_found(&qname))?;
        vol.admin_state = state;
        if state == AdminState::Online {
            vol.online_after = self.online_lag;
        }
        debug!("Mock: volume {} admin_state={}", qname, state);
        Ok(())
    }

    async fn delete_volume(&self, _ctx: &ReqContext, name: &str) -> Result<()> {
        let qname = qualify_name(name);
        let mut inner = self.inner.write().await;
        if !inner.volumes.contains_key(&qname) {
            return Err(ApplianceError::not_found(&qname));
        }
        if let Some(status) = self.fail_delete_status {
            return Err(ApplianceError::api(status, "mock delete failure"));
        }
        inner.volumes.remove(&qname);
        debug!("Mock: volume {} deleted", qname);
        Ok(())
    }

    async fn get_storage_endpoint(&self, _ctx: &ReqContext, name: &str) -> Result<EndpointInfo> {
        let qname = qualify_name(name);
        let mut inner = self.inner.write().await;
        let vol = inner
            .volumes
            .get_mut(&qname)
            .ok_or_else(|| ApplianceError::not_found(&qname))?;

        if vol.endpoint_after > 0 {
            vol.endpoint_after -= 1;
            return Ok(EndpointInfo::default());
        }
        Ok(EndpointInfo {
            iqn: format!("iqn.2016-01.io.basalt:{}", qname.to_lowercase()),
            portals: self.portals.clone(),
            volume_uuid: vol.volume_uuid.clone(),
        })
    }

    async fn list_volumes(&self, _ctx: &ReqContext) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner
            .volumes
            .keys()
            .filter(|n| n.starts_with(VOLUME_PREFIX))
            .map(|n| strip_name(n).to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn get_initiator(&self, _ctx: &ReqContext, id: &str) -> Result<Initiator> {
        let inner = self.inner.read().await;
        inner
            .initiators
            .get(id)
            .cloned()
            .ok_or_else(|| ApplianceError::not_found(format!("initiators/{}", id)))
    }

    async fn create_initiator(&self, _ctx: &ReqContext, name: &str, id: &str) -> Result<Initiator> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.initiators.get(id) {
            return Ok(existing.clone());
        }
        let init = Initiator {
            name: name.to_string(),
            id: id.to_string(),
            path: format!("/initiators/{}", id),
        };
        inner.initiators.insert(id.to_string(), init.clone());
        Ok(init)
    }

    async fn get_acl(&self, _ctx: &ReqContext, volume: &str) -> Result<AclPolicy> {
        let qname = qualify_name(volume);
        let inner = self.inner.read().await;
        inner
            .volumes
            .get(&qname)
            .map(|v| v.acl.clone())
            .ok_or_else(|| ApplianceError::not_found(&qname))
    }

    async fn put_acl(&self, _ctx: &ReqContext, volume: &str, acl: &AclPolicy) -> Result<()> {
        let qname = qualify_name(volume);
        let mut inner = self.inner.write().await;
        let vol = inner
            .volumes
            .get_mut(&qname)
            .ok_or_else(|| ApplianceError::not_found(&qname))?;
        vol.acl = acl.clone();
        Ok(())
    }
}
