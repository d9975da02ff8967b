use crate::error::{HostError, Result};
use basalt_appliance::{ApplianceGateway, InitiatorRef};
use basalt_core::ReqContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Well-known file holding the host's iSCSI identity
pub const INITIATOR_FILE: &str = "/etc/iscsi/initiatorname.iscsi";

/// Extract the initiator IQN from initiatorname.iscsi contents.
///
/// The file carries a single `InitiatorName=<iqn>` line, possibly with
/// comments around it.
pub fn parse_initiator_name(contents: &str) -> Option<String> {
    for line in contents.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("InitiatorName=") {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Manages the host's initiator object and per-volume ACL membership.
///
/// ACL updates are additive on attach and subtractive on detach: other
/// hosts may share the volume, so the policy is never cleared wholesale.
pub struct InitiatorManager {
    appliance: Arc<dyn ApplianceGateway>,
    initiator_file: PathBuf,
}

impl InitiatorManager {
    pub fn new(appliance: Arc<dyn ApplianceGateway>) -> Self {
        Self::with_file(appliance, Path::new(INITIATOR_FILE))
    }

    pub fn with_file(appliance: Arc<dyn ApplianceGateway>, initiator_file: &Path) -> Self {
        Self {
            appliance,
            initiator_file: initiator_file.to_path_buf(),
        }
    }

    /// Read the local initiator IQN from the host file.
    pub async fn local_iqn(&self) -> Result<String> {
        let path = self.initiator_file.display().to_string();
        let contents = tokio::fs::read_to_string(&self.initiator_file)
            .await
            .map_err(|e| HostError::initiator_file(&path, e.to_string()))?;
        parse_initiator_name(&contents)
            .ok_or_else(|| HostError::initiator_file(&path, "no InitiatorName= line"))
    }

    /// Ensure the initiator object exists on the appliance and the
    /// volume's ACL permits it. Returns the initiator's reference path.
    ///
    /// Re-adding a present initiator is a no-op; failure here aborts the
    /// mount since login would be rejected anyway.
    pub async fn ensure_registered(&self, ctx: &ReqContext, volume: &str) -> Result<String> {
        let iqn = self.local_iqn().await?;

        let path = match self.appliance.get_initiator(ctx, &iqn).await {
            Ok(init) if !init.path.is_empty() => init.path,
            Ok(_) => format!("/initiators/{}", iqn),
            Err(e) if e.is_not_found() => {
                let human_name = format!("BASALT-{}", Uuid::new_v4());
                info!(req = ctx.req, tid = %ctx.tid, "Registering initiator {} as {}", iqn, human_name);
                let init = self
                    .appliance
                    .create_initiator(ctx, &human_name, &iqn)
                    .await?;
                if init.path.is_empty() {
                    format!("/initiators/{}", iqn)
                } else {
                    init.path
                }
            }
            Err(e) => return Err(e.into()),
        };

        let mut acl = self.appliance.get_acl(ctx, volume).await?;
        if acl.contains(&path) {
            debug!(req = ctx.req, tid = %ctx.tid, "Initiator {} already in ACL for {}", path, volume);
            return Ok(path);
        }
        acl.initiators.push(InitiatorRef { path: path.clone() });
        self.appliance.put_acl(ctx, volume, &acl).await?;
        debug!(req = ctx.req, tid = %ctx.tid, "Added {} to ACL for {}", path, volume);
        Ok(path)
    }

    /// Remove exactly the local host's entry from the volume's ACL,
    /// leaving entries from other hosts intact.
    pub async fn unregister(&self, ctx: &ReqContext, volume: &str) -> Result<()> {
        let iqn = self.local_iqn().await?;
        let path = format!("/initiators/{}", iqn);

        let mut acl = self.appliance.get_acl(ctx, volume).await?;
        let before = acl.initiators.len();
        acl.initiators.retain(|i| i.path != path);
        if acl.initiators.len() == before {
            debug!(req = ctx.req, tid = %ctx.tid, "Initiator {} not in ACL for {}", path, volume);
            return Ok(());
        }
        self.appliance.put_acl(ctx, volume, &acl).await?;
        debug!(req = ctx.req, tid = %ctx.tid, "Removed {} from ACL for {}", path, volume);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_appliance::MockAppliance;
    use basalt_core::VolumeOpts;
    use std::io::Write;

    fn ctx() -> ReqContext {
        ReqContext::new("test")
    }

    fn write_initiator_file(iqn: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "## DO NOT EDIT OR REMOVE THIS FILE!").unwrap();
        writeln!(f, "InitiatorName={}", iqn).unwrap();
        f
    }

    async fn appliance_with_volume(name: &str) -> Arc<MockAppliance> {
        let mock = Arc::new(MockAppliance::new());
        let mut opts = VolumeOpts::default();
        opts.apply_defaults();
        mock.create_volume(&ctx(), name, &opts).await.unwrap();
        mock
    }

    #[test]
    fn test_parse_initiator_name() {
        let contents = "## comment\nInitiatorName=iqn.1993-08.org.debian:01:abc\n";
        assert_eq!(
            parse_initiator_name(contents).unwrap(),
            "iqn.1993-08.org.debian:01:abc"
        );
        assert!(parse_initiator_name("## nothing here\n").is_none());
        assert!(parse_initiator_name("InitiatorName=\n").is_none());
    }

    #[tokio::test]
    async fn test_ensure_registered_creates_initiator_and_acl_entry() {
        let mock = appliance_with_volume("vol").await;
        let file = write_initiator_file("iqn.1993-08.org.debian:01:host-a");
        let mgr = InitiatorManager::with_file(mock.clone(), file.path());

        let path = mgr.ensure_registered(&ctx(), "vol").await.unwrap();
        assert_eq!(path, "/initiators/iqn.1993-08.org.debian:01:host-a");
        assert_eq!(mock.initiator_count().await, 1);
        let acl = mock.get_acl(&ctx(), "vol").await.unwrap();
        assert!(acl.contains(&path));
    }

    #[tokio::test]
    async fn test_ensure_registered_is_idempotent() {
        let mock = appliance_with_volume("vol").await;
        let file = write_initiator_file("iqn.1993-08.org.debian:01:host-a");
        let mgr = InitiatorManager::with_file(mock.clone(), file.path());

        mgr.ensure_registered(&ctx(), "vol").await.unwrap();
        mgr.ensure_registered(&ctx(), "vol").await.unwrap();

        let acl = mock.get_acl(&ctx(), "vol").await.unwrap();
        assert_eq!(acl.initiators.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_preserves_other_hosts() {
        let mock = appliance_with_volume("vol").await;
        mock.seed_acl_entry("vol", "/initiators/iqn.other-host").await;

        let file = write_initiator_file("iqn.1993-08.org.debian:01:host-a");
        let mgr = InitiatorManager::with_file(mock.clone(), file.path());

        mgr.ensure_registered(&ctx(), "vol").await.unwrap();
        mgr.unregister(&ctx(), "vol").await.unwrap();

        let acl = mock.get_acl(&ctx(), "vol").await.unwrap();
        assert_eq!(acl.initiators.len(), 1);
        assert!(acl.contains("/initiators/iqn.other-host"));
    }

    #[tokio::test]
    async fn test_unregister_absent_entry_is_noop() {
        let mock = appliance_with_volume("vol").await;
        let file = write_initiator_file("iqn.1993-08.org.debian:01:host-a");
        let mgr = InitiatorManager::with_file(mock.clone(), file.path());

        mgr.unregister(&ctx(), "vol").await.unwrap();
        let acl = mock.get_acl(&ctx(), "vol").await.unwrap();
        assert!(acl.initiators.is_empty());
    }

    #[tokio::test]
    async fn test_missing_initiator_file_is_surfaced() {
        let mock = appliance_with_volume("vol").await;
        let mgr = InitiatorManager::with_file(mock, Path::new("/nonexistent/initiator"));
        let err = mgr.ensure_registered(&ctx(), "vol").await.unwrap_err();
        assert!(matches!(err, HostError::InitiatorFile { .. }));
    }
}
