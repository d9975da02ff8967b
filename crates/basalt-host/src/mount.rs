use crate::command::run;
use crate::error::{HostError, Result};
use basalt_core::ReqContext;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Unmount retry budget (1s spacing)
pub const UNMOUNT_ATTEMPTS: usize = 20;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A destination is considered mounted when its st_dev differs from its
/// parent's st_dev, i.e. it sits on a different device.
pub fn is_already_mounted(destination: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let dest = std::fs::metadata(destination)?;
    let parent = std::fs::symlink_metadata(destination.join(".."))?;
    Ok(dest.dev() != parent.dev())
}

/// mkfs program and fs-specific options for first-use formatting.
pub fn mkfs_invocation(fs_type: &str) -> (String, Vec<&'static str>) {
    let program = format!("mkfs.{}", fs_type);
    let args = match fs_type {
        "ext4" => vec![
            "-E",
            "lazy_itable_init=0,lazy_journal_init=0,nodiscard",
            "-F",
        ],
        "xfs" => vec!["-K"],
        _ => vec![],
    };
    (program, args)
}

/// Extract the filesystem type from blkid output (the `TYPE="..."` token).
pub fn parse_blkid_type(output: &str) -> Option<String> {
    let start = output.find("TYPE=\"")? + "TYPE=\"".len();
    let rest = &output[start..];
    let end = rest.find('"')?;
    let fs = &rest[..end];
    if fs.is_empty() {
        None
    } else {
        Some(fs.to_string())
    }
}

/// Whether unmount output means the destination was not mounted at all.
pub fn output_says_not_mounted(output: &str) -> bool {
    output.contains("not mounted") || output.contains("not currently mounted")
}

/// Probe the filesystem on a device via blkid. Used on adoption paths
/// where the intended filesystem is unknown; probe failures simply mean
/// "nothing detected".
pub async fn detect_fs_type(ctx: &ReqContext, device: &Path) -> Result<Option<String>> {
    let device_str = device.display().to_string();
    let out = run(ctx, "blkid", &[&device_str]).await?;
    if !out.success() {
        debug!(req = ctx.req, tid = %ctx.tid, "blkid found no filesystem on {}: {}", device_str, out.combined());
        return Ok(None);
    }
    Ok(parse_blkid_type(&out.combined()))
}

/// Mount a device, formatting it on first use.
///
/// The mount utility is tried as-is first; on failure the device is
/// formatted with fs-specific mkfs options and the mount retried exactly
/// once. A destination that is already a mount point fails with an
/// "in use" condition before anything is touched.
pub async fn mount_device(
    ctx: &ReqContext,
    device: &Path,
    destination: &Path,
    fs_type: &str,
) -> Result<()> {
    let device_str = device.display().to_string();
    let dest_str = destination.display().to_string();
    debug!(
        req = ctx.req, tid = %ctx.tid,
        "Mounting volume {} to {}, file-system {}", device_str, dest_str, fs_type
    );

    if is_already_mounted(destination)? {
        return Err(HostError::already_mounted(dest_str));
    }

    // Best-effort consistency check before the first mount attempt
    let _ = run(ctx, "fsck", &["-a", &device_str]).await;

    let mount_args = ["-t", fs_type, &device_str, &dest_str];
    let out = run(ctx, "mount", &mount_args).await?;
    if out.success() {
        debug!(req = ctx.req, tid = %ctx.tid, "Mounted {} on {}", device_str, dest_str);
        return Ok(());
    }

    warn!(
        req = ctx.req, tid = %ctx.tid,
        "mount failed for {}: {}", device_str, out.combined()
    );
    info!(req = ctx.req, tid = %ctx.tid, "Checking for disk formatting: {}", device_str);

    let (mkfs, mkfs_args) = mkfs_invocation(fs_type);
    let mut mkfs_args: Vec<&str> = mkfs_args;
    mkfs_args.push(&device_str);
    let mkfs_out = run(ctx, &mkfs, &mkfs_args).await?;
    if !mkfs_out.success() {
        warn!(req = ctx.req, tid = %ctx.tid, "mkfs failed: {}", mkfs_out.combined());
        return Err(HostError::MountFailed {
            device: device_str,
            destination: dest_str,
            output: mkfs_out.combined(),
        });
    }

    debug!(req = ctx.req, tid = %ctx.tid, "Done with formatting, mounting again");
    let out = run(ctx, "mount", &mount_args).await?;
    if !out.success() {
        return Err(HostError::MountFailed {
            device: device_str,
            destination: dest_str,
            output: out.combined(),
        });
    }
    debug!(req = ctx.req, tid = %ctx.tid, "Mounted {} on {}", device_str, dest_str);
    Ok(())
}

/// Unmount a destination with a bounded retry budget. Output reporting
/// the destination as not mounted counts as success. On success the
/// empty mount directory is removed best-effort.
pub async fn unmount(ctx: &ReqContext, destination: &Path, attempts: usize) -> Result<()> {
    let dest_str = destination.display().to_string();
    debug!(req = ctx.req, tid = %ctx.tid, "Unmounting: {}", dest_str);

    let mut last_output = String::new();
    let mut unmounted = false;
    for i in 0..attempts {
        let out = run(ctx, "umount", &[&dest_str]).await?;
        if out.success() || output_says_not_mounted(&out.combined()) {
            unmounted = true;
            break;
        }
        debug!(req = ctx.req, tid = %ctx.tid, "Unmount failed for {}: {}", dest_str, out.combined());
        last_output = out.combined();
        if i + 1 < attempts {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    if !unmounted {
        return Err(HostError::UnmountFailed {
            destination: dest_str,
            attempts,
            output: last_output,
        });
    }

    if let Err(e) = tokio::fs::remove_dir(destination).await {
        warn!(req = ctx.req, tid = %ctx.tid, "Couldn't remove directory {}: {}", dest_str, e);
    }
    debug!(req = ctx.req, tid = %ctx.tid, "Unmount successful");
    Ok(())
}
