use crate::command::{run, run_checked};
use crate::error::{HostError, Result};
use basalt_appliance::EndpointInfo;
use basalt_core::ReqContext;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Authoritative directory for device discovery
pub const DEV_BY_UUID: &str = "/dev/disk/by-uuid";
/// sysfs root scanned during multipath resolution
pub const SYS_BLOCK: &str = "/sys/block";
/// iSCSI portal port
pub const ISCSI_PORT: u16 = 3260;

/// Attempts waiting for the block device after login
pub const DEVICE_WAIT_ATTEMPTS: usize = 10;
/// Attempts for the outer login poller
pub const LOGIN_ATTEMPTS: usize = 10;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Device path for a volume UUID.
pub fn uuid_device_path(uuid: &str) -> PathBuf {
    Path::new(DEV_BY_UUID).join(uuid)
}

/// Poll for a device path with a bounded attempt budget (1s spacing).
/// A stat error other than not-found gives up immediately.
pub async fn wait_for_device(path: &Path, attempts: usize) -> bool {
    for i in 0..attempts {
        match tokio::fs::metadata(path).await {
            Ok(_) => {
                debug!("Disk available: {}", path.display());
                return true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Waiting for disk: {}", path.display());
            }
            Err(e) => {
                warn!("Error waiting for disk {}: {}", path.display(), e);
                return false;
            }
        }
        if i + 1 < attempts {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
    false
}

/// Resolve a by-uuid symlink to its multipath aggregate.
///
/// If the symlink already points at a `dm-*` device the input path is
/// returned. Otherwise every `/sys/block/dm-*/slaves/*` entry is scanned
/// for the symlink's target device; a match yields `/dev/<dm-name>`.
/// The sysfs and /dev roots are parameters so tests can fabricate a tree.
pub fn resolve_multipath(uuid_path: &Path, sys_block: &Path, dev_root: &Path) -> Result<PathBuf> {
    let target = std::fs::read_link(uuid_path)?;
    let device = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if device.starts_with("dm-") {
        return Ok(uuid_path.to_path_buf());
    }

    for entry in std::fs::read_dir(sys_block)? {
        let entry = entry?;
        let dm_name = entry.file_name().to_string_lossy().to_string();
        if !dm_name.starts_with("dm-") {
            continue;
        }
        let slaves = entry.path().join("slaves");
        let Ok(slave_entries) = std::fs::read_dir(&slaves) else {
            continue;
        };
        for slave in slave_entries.flatten() {
            if slave.file_name().to_string_lossy() == device {
                debug!(
                    "Found matching device {} under {}",
                    device,
                    entry.path().display()
                );
                return Ok(dev_root.join(&dm_name));
            }
        }
    }

    Err(HostError::multipath_unresolved(
        uuid_path.display().to_string(),
        target.display().to_string(),
    ))
}

fn resolve_multipath_host(uuid_path: &Path) -> Result<PathBuf> {
    resolve_multipath(uuid_path, Path::new(SYS_BLOCK), Path::new("/dev"))
}

/// Discover and log in to the volume's target, returning the block device
/// path (the multipath aggregate when multipathing is on).
///
/// With multipath every portal is logged in; otherwise only the first.
/// Any portal failure aborts with that portal's error output.
pub async fn attach(ctx: &ReqContext, endpoint: &EndpointInfo, multipath: bool) -> Result<PathBuf> {
    debug!(
        req = ctx.req, tid = %ctx.tid,
        "Logging in iqn: {}, portals: {:?}", endpoint.iqn, endpoint.portals
    );
    let uuid_path = uuid_device_path(&endpoint.volume_uuid);

    if wait_for_device(&uuid_path, 1).await {
        let disk = if multipath {
            resolve_multipath_host(&uuid_path)?
        } else {
            uuid_path
        };
        debug!(req = ctx.req, tid = %ctx.tid, "Disk {} is already available", disk.display());
        return Ok(disk);
    }

    if endpoint.portals.is_empty() {
        return Err(HostError::EndpointTimeout {
            name: endpoint.iqn.clone(),
            attempts: 0,
        });
    }
    let use_portals: &[String] = if multipath {
        &endpoint.portals
    } else {
        debug!(req = ctx.req, tid = %ctx.tid, "No multipath, only using first portal");
        &endpoint.portals[..1]
    };

    for portal in use_portals {
        let addr = format!("{}:{}", portal, ISCSI_PORT);
        run_checked(
            ctx,
            "iscsiadm",
            &["-m", "discovery", "-t", "sendtargets", "-p", &addr],
        )
        .await?;
        run_checked(
            ctx,
            "iscsiadm",
            &["-m", "node", "-p", &addr, "-T", &endpoint.iqn, "--login"],
        )
        .await?;
    }

    if !wait_for_device(&uuid_path, DEVICE_WAIT_ATTEMPTS).await {
        return Err(HostError::device_timeout(
            uuid_path.display().to_string(),
            DEVICE_WAIT_ATTEMPTS,
        ));
    }

    if multipath {
        resolve_multipath_host(&uuid_path)
    } else {
        Ok(uuid_path)
    }
}

/// Attach with a bounded outer retry budget (1s spacing).
pub async fn attach_with_retry(
    ctx: &ReqContext,
    endpoint: &EndpointInfo,
    multipath: bool,
    attempts: usize,
) -> Result<PathBuf> {
    for i in 1..attempts {
        debug!(req = ctx.req, tid = %ctx.tid, "Polling login, attempt {}/{}", i, attempts);
        match attach(ctx, endpoint, multipath).await {
            Ok(disk) => return Ok(disk),
            Err(e) => {
                debug!(req = ctx.req, tid = %ctx.tid, "Login attempt failed: {}", e);
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
    attach(ctx, endpoint, multipath).await
}

/// Log out of the target on every portal and delete the node records.
/// If a multipath aggregate was assembled, flush it by name. All steps
/// are best-effort: errors are logged and never fatal to the caller.
pub async fn detach(ctx: &ReqContext, endpoint: &EndpointInfo) {
    let uuid_path = uuid_device_path(&endpoint.volume_uuid);
    // Resolve the aggregate before logout tears the symlink down
    let aggregate = resolve_multipath_host(&uuid_path)
        .ok()
        .filter(|p| p != &uuid_path);

    for portal in &endpoint.portals {
        let addr = format!("{}:{}", portal, ISCSI_PORT);
        match run(
            ctx,
            "iscsiadm",
            &["-m", "node", "-p", &addr, "-T", &endpoint.iqn, "--logout"],
        )
        .await
        {
            Ok(out) if !out.success() => {
                warn!(req = ctx.req, tid = %ctx.tid, "Unable to logout target {} at {}: {}", endpoint.iqn, addr, out.combined());
            }
            Err(e) => warn!(req = ctx.req, tid = %ctx.tid, "Logout failed: {}", e),
            _ => {}
        }
        match run(
            ctx,
            "iscsiadm",
            &["-m", "node", "-p", &addr, "-T", &endpoint.iqn, "--op=delete"],
        )
        .await
        {
            Ok(out) if !out.success() => {
                warn!(req = ctx.req, tid = %ctx.tid, "Unable to delete node {} at {}: {}", endpoint.iqn, addr, out.combined());
            }
            Err(e) => warn!(req = ctx.req, tid = %ctx.tid, "Node delete failed: {}", e),
            _ => {}
        }
    }

    if let Some(aggregate) = aggregate {
        let disk = aggregate
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match run(ctx, "multipath", &["-f", &disk]).await {
            Ok(out) if !out.success() => {
                warn!(req = ctx.req, tid = %ctx.tid, "Unable to flush multipath device {}: {}", disk, out.combined());
            }
            Err(e) => warn!(req = ctx.req, tid = %ctx.tid, "Multipath flush failed: {}", e),
            _ => {}
        }
    }
}
