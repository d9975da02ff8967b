use crate::error::{HostError, Result};
use crate::iscsi::uuid_device_path;
use crate::traits::HostRuntime;
use async_trait::async_trait;
use basalt_appliance::EndpointInfo;
use basalt_core::ReqContext;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Record of an attach invocation, for test assertions.
#[derive(Debug, Clone)]
pub struct AttachCall {
    pub iqn: String,
    pub portals: Vec<String>,
    pub volume_uuid: String,
    pub multipath: bool,
}

#[derive(Default)]
struct State {
    attach_calls: Vec<AttachCall>,
    /// destination -> (device, fs)
    mounts: HashMap<PathBuf, (PathBuf, String)>,
    unmount_calls: Vec<PathBuf>,
    detach_calls: Vec<String>,
}

/// In-memory host runtime for testing the orchestrator without root.
///
/// Simulates device paths (a `dm-` aggregate under multipath), remembers
/// mounts, and swallows unmounts of not-mounted destinations the way the
/// real unmount path does.
pub struct MockHost {
    state: Arc<RwLock<State>>,
    multipath: bool,
    existing_fs: Option<String>,
    fail_attach: bool,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            multipath: false,
            existing_fs: None,
            fail_attach: false,
        }
    }

    pub fn with_multipath(mut self) -> Self {
        self.multipath = true;
        self
    }

    /// Simulate a device that already carries a filesystem.
    pub fn with_existing_fs(mut self, fs: &str) -> Self {
        self.existing_fs = Some(fs.to_string());
        self
    }

    pub fn with_failing_attach(mut self) -> Self {
        self.fail_attach = true;
        self
    }

    pub async fn attach_calls(&self) -> Vec<AttachCall> {
        self.state.read().await.attach_calls.clone()
    }

    pub async fn mounted_at(&self, destination: &Path) -> Option<(PathBuf, String)> {
        self.state.read().await.mounts.get(destination).cloned()
    }

    pub async fn unmount_count(&self) -> usize {
        self.state.read().await.unmount_calls.len()
    }

    pub async fn detach_count(&self) -> usize {
        self.state.read().await.detach_calls.len()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostRuntime for MockHost {
    async fn multipath_enabled(&self, _ctx: &ReqContext) -> bool {
        self.multipath
    }

    async fn attach(
        &self,
        _ctx: &ReqContext,
        endpoint: &EndpointInfo,
        multipath: bool,
    ) -> Result<PathBuf> {
        if self.fail_attach {
            let path = uuid_device_path(&endpoint.volume_uuid);
            return Err(HostError::device_timeout(path.display().to_string(), 10));
        }
        self.state.write().await.attach_calls.push(AttachCall {
            iqn: endpoint.iqn.clone(),
            portals: endpoint.portals.clone(),
            volume_uuid: endpoint.volume_uuid.clone(),
            multipath,
        });
        let device = if multipath {
            PathBuf::from("/dev/dm-0")
        } else {
            uuid_device_path(&endpoint.volume_uuid)
        };
        debug!("Mock: attached {} as {}", endpoint.iqn, device.display());
        Ok(device)
    }

    async fn detach(&self, _ctx: &ReqContext, endpoint: &EndpointInfo) {
        self.state
            .write()
            .await
            .detach_calls
            .push(endpoint.iqn.clone());
        debug!("Mock: detached {}", endpoint.iqn);
    }

    async fn mount_device(
        &self,
        _ctx: &ReqContext,
        device: &Path,
        destination: &Path,
        fs_type: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.mounts.contains_key(destination) {
            return Err(HostError::already_mounted(
                destination.display().to_string(),
            ));
        }
        state.mounts.insert(
            destination.to_path_buf(),
            (device.to_path_buf(), fs_type.to_string()),
        );
        debug!(
            "Mock: mounted {} on {} ({})",
            device.display(),
            destination.display(),
            fs_type
        );
        Ok(())
    }

    async fn unmount(&self, _ctx: &ReqContext, destination: &Path) -> Result<()> {
        let mut state = self.state.write().await;
        state.unmount_calls.push(destination.to_path_buf());
        // Not mounted counts as success, like the real unmount path
        state.mounts.remove(destination);
        debug!("Mock: unmounted {}", destination.display());
        Ok(())
    }

    async fn detect_fs_type(&self, _ctx: &ReqContext, _device: &Path) -> Result<Option<String>> {
        Ok(self.existing_fs.clone())
    }
}
