use crate::error::Result;
use async_trait::async_trait;
use basalt_appliance::EndpointInfo;
use basalt_core::ReqContext;
use std::path::{Path, PathBuf};

/// Trait over the host-side kernel-facing operations.
///
/// This abstracts the iSCSI and mount stacks so the orchestrator can be
/// tested without root or an array: `LinuxHost` drives the real utilities
/// through the executor, `MockHost` keeps everything in memory.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    /// Probe for a running multipath daemon. Any probe error means "no
    /// multipath".
    async fn multipath_enabled(&self, ctx: &ReqContext) -> bool;

    /// Discover, log in, and wait for the block device. Returns the
    /// device path (the multipath aggregate when multipathing is on).
    async fn attach(
        &self,
        ctx: &ReqContext,
        endpoint: &EndpointInfo,
        multipath: bool,
    ) -> Result<PathBuf>;

    /// Log out per portal and delete node records. Best-effort.
    async fn detach(&self, ctx: &ReqContext, endpoint: &EndpointInfo);

    /// Wait for the device, ensure the destination directory exists
    /// (mode 0750), and mount, formatting on first use.
    async fn mount_device(
        &self,
        ctx: &ReqContext,
        device: &Path,
        destination: &Path,
        fs_type: &str,
    ) -> Result<()>;

    /// Unmount with retry; "not mounted" counts as success.
    async fn unmount(&self, ctx: &ReqContext, destination: &Path) -> Result<()>;

    /// Detect an existing filesystem on the device, if any.
    async fn detect_fs_type(&self, ctx: &ReqContext, device: &Path) -> Result<Option<String>>;
}
