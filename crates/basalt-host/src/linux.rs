use crate::command::run;
use crate::error::{HostError, Result};
use crate::iscsi::{self, DEVICE_WAIT_ATTEMPTS, LOGIN_ATTEMPTS};
use crate::mount::{self, UNMOUNT_ATTEMPTS};
use crate::traits::HostRuntime;
use async_trait::async_trait;
use basalt_appliance::EndpointInfo;
use basalt_core::ReqContext;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Real host runtime: drives iscsiadm, mount, mkfs, blkid, and multipath
/// through the executor.
#[derive(Default)]
pub struct LinuxHost;

impl LinuxHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostRuntime for LinuxHost {
    async fn multipath_enabled(&self, ctx: &ReqContext) -> bool {
        let probe = "ps -ef | grep multipathd | grep -v grep | wc -l";
        match run(ctx, "bash", &["-c", probe]).await {
            Ok(out) if out.success() => {
                let count = out.stdout.trim().parse::<u64>().unwrap_or(0);
                debug!(req = ctx.req, tid = %ctx.tid, "Multipath daemon process count: {}", count);
                count != 0
            }
            _ => {
                debug!(req = ctx.req, tid = %ctx.tid, "Host does not support multipathing");
                false
            }
        }
    }

    async fn attach(
        &self,
        ctx: &ReqContext,
        endpoint: &EndpointInfo,
        multipath: bool,
    ) -> Result<PathBuf> {
        iscsi::attach_with_retry(ctx, endpoint, multipath, LOGIN_ATTEMPTS).await
    }

    async fn detach(&self, ctx: &ReqContext, endpoint: &EndpointInfo) {
        iscsi::detach(ctx, endpoint).await
    }

    async fn mount_device(
        &self,
        ctx: &ReqContext,
        device: &Path,
        destination: &Path,
        fs_type: &str,
    ) -> Result<()> {
        if !iscsi::wait_for_device(device, DEVICE_WAIT_ATTEMPTS).await {
            return Err(HostError::device_timeout(
                device.display().to_string(),
                DEVICE_WAIT_ATTEMPTS,
            ));
        }

        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        builder.mode(0o750);
        builder.create(destination).await?;

        mount::mount_device(ctx, device, destination, fs_type).await
    }

    async fn unmount(&self, ctx: &ReqContext, destination: &Path) -> Result<()> {
        mount::unmount(ctx, destination, UNMOUNT_ATTEMPTS).await
    }

    async fn detect_fs_type(&self, ctx: &ReqContext, device: &Path) -> Result<Option<String>> {
        mount::detect_fs_type(ctx, device).await
    }
}
