use crate::error::{HostError, Result};
use crate::initiator::InitiatorManager;
use crate::traits::HostRuntime;
use basalt_appliance::{
    AdminState, ApplianceGateway, EndpointInfo, Metadata, META_FSTYPE, META_PERSISTENCE,
};
use basalt_core::options::DEFAULT_FS;
use basalt_core::{Framework, PersistenceMode, ReqContext, VolumeOpts, MOUNT_ROOT};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root under which per-volume mount points are derived
    pub mount_root: PathBuf,
    /// Deployment framework; dcos-docker enables implicit create on Get
    pub framework: Framework,
    /// Optional per-deployment volume option defaults from the config file
    pub volume_defaults: Option<VolumeOpts>,
    /// Poll budget for the admin_state=online transition
    pub online_attempts: usize,
    /// Poll budget for storage-endpoint readiness
    pub endpoint_attempts: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mount_root: PathBuf::from(MOUNT_ROOT),
            framework: Framework::Bare,
            volume_defaults: None,
            online_attempts: 10,
            endpoint_attempts: 10,
        }
    }
}

/// A volume as presented to the runtime: user-facing name plus derived
/// mount point.
#[derive(Debug, Clone)]
pub struct VolumeEntry {
    pub name: String,
    pub mountpoint: PathBuf,
}

/// Top-level state machine for volume lifecycle operations.
///
/// Holds no volume state in memory: the appliance and the kernel's view
/// of mounts are queried per request. All mutating operations serialize
/// behind a single process-wide mutex; the kernel iSCSI and mount stacks
/// are process-global, and operation latency is dominated by network
/// round trips anyway.
pub struct Orchestrator {
    appliance: Arc<dyn ApplianceGateway>,
    host: Arc<dyn HostRuntime>,
    initiators: InitiatorManager,
    lock: Mutex<()>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        appliance: Arc<dyn ApplianceGateway>,
        host: Arc<dyn HostRuntime>,
        initiators: InitiatorManager,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            appliance,
            host,
            initiators,
            lock: Mutex::new(()),
            config,
        }
    }

    /// Derive the mount point for a volume name.
    pub fn mount_point(&self, name: &str) -> PathBuf {
        self.config.mount_root.join(name)
    }

    /// Create a volume on the appliance. Creating an already-present
    /// volume is a success and leaves it untouched.
    pub async fn create(&self, ctx: &ReqContext, name: &str, opts: VolumeOpts) -> Result<()> {
        let _guard = self.lock.lock().await;
        debug!(req = ctx.req, tid = %ctx.tid, "Creating volume {}", name);

        match self.appliance.get_volume(ctx, name).await {
            Ok(_) => {
                debug!(req = ctx.req, tid = %ctx.tid, "Found already created volume: {}", name);
                return Ok(());
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        self.create_locked(ctx, name, opts).await
    }

    async fn create_locked(&self, ctx: &ReqContext, name: &str, mut opts: VolumeOpts) -> Result<()> {
        if let Some(defaults) = &self.config.volume_defaults {
            opts.merge_config(defaults);
        }
        opts.apply_defaults();
        debug!(req = ctx.req, tid = %ctx.tid, "Volume opts after defaults: {:?}", opts);

        self.appliance.create_volume(ctx, name, &opts).await?;

        if opts.max_iops != 0 || opts.max_bw != 0 {
            self.appliance
                .set_performance_policy(ctx, name, opts.max_iops, opts.max_bw)
                .await?;
        }

        // Persist what Mount needs to find later
        let mut meta = Metadata::new();
        meta.insert(
            META_PERSISTENCE.to_string(),
            opts.persistence_mode().as_str().to_string(),
        );
        meta.insert(META_FSTYPE.to_string(), opts.fs_type.clone());
        self.appliance.put_metadata(ctx, name, &meta).await?;
        Ok(())
    }

    /// Attach a volume to this host and mount it, returning the mount
    /// point.
    pub async fn mount(&self, ctx: &ReqContext, name: &str) -> Result<PathBuf> {
        let _guard = self.lock.lock().await;
        self.mount_locked(ctx, name).await
    }

    async fn mount_locked(&self, ctx: &ReqContext, name: &str) -> Result<PathBuf> {
        let dest = self.mount_point(name);
        debug!(req = ctx.req, tid = %ctx.tid, "Mounting volume {} on {}", name, dest.display());

        if let Err(e) = self.appliance.get_volume(ctx, name).await {
            return Err(if e.is_not_found() {
                HostError::volume_not_found(name)
            } else {
                e.into()
            });
        }

        let (_, intended_fs) = self.read_metadata(ctx, name).await?;

        self.wait_online(ctx, name).await?;
        let endpoint = self.wait_endpoint(ctx, name).await?;

        // ACL must permit this host before login is attempted
        self.initiators.ensure_registered(ctx, name).await?;

        let multipath = self.host.multipath_enabled(ctx).await;
        let device = self.host.attach(ctx, &endpoint, multipath).await?;

        let mut fs = intended_fs.trim().to_string();
        if fs.is_empty() {
            match self.host.detect_fs_type(ctx, &device).await.unwrap_or(None) {
                Some(detected) => {
                    debug!(req = ctx.req, tid = %ctx.tid, "Adopting detected fs {} for volume {}", detected, name);
                    fs = detected;
                }
                None => {
                    debug!(req = ctx.req, tid = %ctx.tid, "No fs detected or requested for {}, using {}", name, DEFAULT_FS);
                    fs = DEFAULT_FS.to_string();
                }
            }
        }

        self.host.mount_device(ctx, &device, &dest, &fs).await?;
        Ok(dest)
    }

    /// Unmount a volume from this host. When the volume's persistence
    /// mode is `auto`, the volume is removed from the appliance as well.
    pub async fn unmount(&self, ctx: &ReqContext, name: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.unmount_locked(ctx, name).await?;

        let (persistence, _) = self.read_metadata(ctx, name).await?;
        if persistence == PersistenceMode::Auto {
            info!(
                req = ctx.req, tid = %ctx.tid,
                "Volume {} persistence mode is auto, deleting after unmount", name
            );
            self.remove_locked(ctx, name).await?;
        }
        Ok(())
    }

    async fn unmount_locked(&self, ctx: &ReqContext, name: &str) -> Result<()> {
        let dest = self.mount_point(name);
        debug!(req = ctx.req, tid = %ctx.tid, "Unmounting volume {} from {}", name, dest.display());

        let endpoint: EndpointInfo = self
            .appliance
            .get_storage_endpoint(ctx, name)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    HostError::volume_not_found(name)
                } else {
                    HostError::from(e)
                }
            })?;

        self.host.unmount(ctx, &dest).await?;
        self.host.detach(ctx, &endpoint).await;

        // Other hosts may still be attached; only our entry goes
        if let Err(e) = self.initiators.unregister(ctx, name).await {
            warn!(req = ctx.req, tid = %ctx.tid, "Couldn't remove initiator from ACL for {}: {}", name, e);
        }
        Ok(())
    }

    /// Remove a volume. Unmounts best-effort first; delete failures are
    /// downgraded to warnings so a runtime remove never spuriously fails.
    pub async fn remove(&self, ctx: &ReqContext, name: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        debug!(req = ctx.req, tid = %ctx.tid, "Removing volume {}", name);

        if let Err(e) = self.unmount_locked(ctx, name).await {
            warn!(req = ctx.req, tid = %ctx.tid, "Error unmounting volume {}: {}", name, e);
        }
        self.remove_locked(ctx, name).await
    }

    async fn remove_locked(&self, ctx: &ReqContext, name: &str) -> Result<()> {
        if let Err(e) = self
            .appliance
            .set_admin_state(ctx, name, AdminState::Offline, true)
            .await
        {
            if e.is_not_found() {
                warn!(req = ctx.req, tid = %ctx.tid, "Volume {} not found while taking offline", name);
                return Ok(());
            }
            warn!(req = ctx.req, tid = %ctx.tid, "Error taking volume {} offline: {}", name, e);
        }

        match self.appliance.delete_volume(ctx, name).await {
            Ok(()) => info!(req = ctx.req, tid = %ctx.tid, "Volume {} deleted", name),
            Err(e) if e.is_not_found() => {
                warn!(req = ctx.req, tid = %ctx.tid, "Volume {} already absent on delete", name);
            }
            Err(e) => {
                warn!(req = ctx.req, tid = %ctx.tid, "Error deleting volume {}: {}", name, e);
            }
        }
        Ok(())
    }

    /// List volumes with derived mount points. Listing never probes the
    /// kernel.
    pub async fn list(&self, ctx: &ReqContext) -> Result<Vec<VolumeEntry>> {
        let _guard = self.lock.lock().await;
        let names = self.appliance.list_volumes(ctx).await?;
        Ok(names
            .into_iter()
            .map(|name| VolumeEntry {
                mountpoint: self.mount_point(&name),
                name,
            })
            .collect())
    }

    /// Confirm a volume exists and derive its mount point. Under
    /// dcos-docker a missing volume is implicitly created with the
    /// configured defaults.
    pub async fn get(&self, ctx: &ReqContext, name: &str) -> Result<PathBuf> {
        let _guard = self.lock.lock().await;
        match self.appliance.get_volume(ctx, name).await {
            Ok(_) => Ok(self.mount_point(name)),
            Err(e) if e.is_not_found() => {
                if self.config.framework.implicit_create() {
                    info!(req = ctx.req, tid = %ctx.tid, "Implicitly creating volume {}", name);
                    self.create_locked(ctx, name, VolumeOpts::default()).await?;
                    Ok(self.mount_point(name))
                } else {
                    Err(HostError::volume_not_found(name))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_metadata(
        &self,
        ctx: &ReqContext,
        name: &str,
    ) -> Result<(PersistenceMode, String)> {
        match self.appliance.get_metadata(ctx, name).await {
            Ok(meta) => {
                let persistence = meta
                    .get(META_PERSISTENCE)
                    .map(|s| PersistenceMode::parse(s))
                    .unwrap_or_default();
                let fs = meta.get(META_FSTYPE).cloned().unwrap_or_default();
                Ok((persistence, fs))
            }
            Err(e) if e.is_not_found() => {
                debug!(req = ctx.req, tid = %ctx.tid, "No metadata for volume {}, using defaults", name);
                Ok((PersistenceMode::Manual, String::new()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_online(&self, ctx: &ReqContext, name: &str) -> Result<()> {
        self.appliance
            .set_admin_state(ctx, name, AdminState::Online, false)
            .await?;

        let attempts = self.config.online_attempts;
        for i in 0..attempts {
            let vol = self.appliance.get_volume(ctx, name).await?;
            if vol.is_online() {
                return Ok(());
            }
            debug!(req = ctx.req, tid = %ctx.tid, "Waiting for {} to come online ({}/{})", name, i + 1, attempts);
            if i + 1 < attempts {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
        Err(HostError::OnlineTimeout {
            name: name.to_string(),
            attempts,
        })
    }

    async fn wait_endpoint(&self, ctx: &ReqContext, name: &str) -> Result<EndpointInfo> {
        let attempts = self.config.endpoint_attempts;
        for i in 0..attempts {
            match self.appliance.get_storage_endpoint(ctx, name).await {
                Ok(info) if info.ready() => return Ok(info),
                Ok(_) => {
                    debug!(req = ctx.req, tid = %ctx.tid, "Endpoint for {} not ready ({}/{})", name, i + 1, attempts);
                }
                Err(e) if e.is_not_found() => {
                    debug!(req = ctx.req, tid = %ctx.tid, "Endpoint for {} not found yet ({}/{})", name, i + 1, attempts);
                }
                Err(e) => return Err(e.into()),
            }
            if i + 1 < attempts {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
        Err(HostError::EndpointTimeout {
            name: name.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHost;
    use basalt_appliance::MockAppliance;
    use std::collections::HashMap;
    use std::io::Write;

    const HOST_IQN: &str = "iqn.1993-08.org.debian:01:host-a";

    struct Fixture {
        appliance: Arc<MockAppliance>,
        host: Arc<MockHost>,
        orch: Orchestrator,
        _initiator_file: tempfile::NamedTempFile,
    }

    fn fixture(appliance: MockAppliance, host: MockHost) -> Fixture {
        fixture_with_config(appliance, host, OrchestratorConfig::default())
    }

    fn fixture_with_config(
        appliance: MockAppliance,
        host: MockHost,
        config: OrchestratorConfig,
    ) -> Fixture {
        let appliance = Arc::new(appliance);
        let host = Arc::new(host);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "InitiatorName={}", HOST_IQN).unwrap();

        let initiators = InitiatorManager::with_file(appliance.clone(), file.path());
        let orch = Orchestrator::new(appliance.clone(), host.clone(), initiators, config);
        Fixture {
            appliance,
            host,
            orch,
            _initiator_file: file,
        }
    }

    fn ctx() -> ReqContext {
        ReqContext::new("test")
    }

    fn opts_from(pairs: &[(&str, &str)]) -> VolumeOpts {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VolumeOpts::from_map(&map)
    }

    #[tokio::test]
    async fn test_raw_create_with_defaults_writes_metadata_and_skips_qos() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        f.orch.create(&ctx(), "A", VolumeOpts::default()).await.unwrap();

        let vol = f.appliance.volume("A").await.unwrap();
        assert_eq!(vol.opts.size, 16);
        assert_eq!(vol.opts.replica, 3);
        assert_eq!(vol.opts.placement_mode, "hybrid");
        assert!(vol.performance.is_none());
        assert_eq!(vol.metadata.get("persistenceMode").unwrap(), "manual");
        assert_eq!(vol.metadata.get("fsType").unwrap(), "ext4");
    }

    #[tokio::test]
    async fn test_create_with_qos_sets_performance_policy() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        let opts = opts_from(&[("size", "50"), ("maxIops", "1000"), ("maxBW", "0")]);
        f.orch.create(&ctx(), "B", opts).await.unwrap();

        let vol = f.appliance.volume("B").await.unwrap();
        assert_eq!(vol.opts.size, 50);
        assert_eq!(vol.performance, Some((1000, 0)));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        f.orch.create(&ctx(), "A", VolumeOpts::default()).await.unwrap();
        f.orch
            .create(&ctx(), "A", opts_from(&[("size", "99"), ("replica", "1")]))
            .await
            .unwrap();

        let vol = f.appliance.volume("A").await.unwrap();
        assert_eq!(vol.opts.size, 16);
        assert_eq!(vol.opts.replica, 3);
    }

    #[tokio::test]
    async fn test_create_merges_config_volume_defaults() {
        let config = OrchestratorConfig {
            volume_defaults: Some(VolumeOpts {
                size: 32,
                fs_type: "xfs".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let f = fixture_with_config(MockAppliance::new(), MockHost::new(), config);
        f.orch.create(&ctx(), "A", VolumeOpts::default()).await.unwrap();

        let vol = f.appliance.volume("A").await.unwrap();
        assert_eq!(vol.opts.size, 32);
        assert_eq!(vol.metadata.get("fsType").unwrap(), "xfs");
    }

    #[tokio::test]
    async fn test_create_mode_precedence_clone_over_template() {
        use basalt_appliance::mock::CreateMode;

        let f = fixture(MockAppliance::new(), MockHost::new());
        let opts = opts_from(&[("template", "gold"), ("cloneSrc", "seed-vol")]);
        f.orch.create(&ctx(), "M", opts).await.unwrap();
        let vol = f.appliance.volume("M").await.unwrap();
        assert_eq!(vol.mode, CreateMode::Clone("seed-vol".to_string()));

        let opts = opts_from(&[("template", "gold")]);
        f.orch.create(&ctx(), "T", opts).await.unwrap();
        let vol = f.appliance.volume("T").await.unwrap();
        assert_eq!(vol.mode, CreateMode::Template("gold".to_string()));
    }

    #[tokio::test]
    async fn test_mount_happy_path() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        f.orch.create(&ctx(), "C", VolumeOpts::default()).await.unwrap();

        let mountpoint = f.orch.mount(&ctx(), "C").await.unwrap();
        assert_eq!(mountpoint, PathBuf::from("/mnt/C"));

        let vol = f.appliance.volume("C").await.unwrap();
        assert_eq!(vol.admin_state, AdminState::Online);
        assert!(vol
            .acl
            .contains(&format!("/initiators/{}", HOST_IQN)));

        let uuid = f.appliance.volume_uuid("C").await.unwrap();
        let (device, fs) = f.host.mounted_at(&mountpoint).await.unwrap();
        assert_eq!(device, PathBuf::from(format!("/dev/disk/by-uuid/{}", uuid)));
        assert_eq!(fs, "ext4");
    }

    #[tokio::test]
    async fn test_mount_of_missing_volume_fails_not_found() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        let err = f.orch.mount(&ctx(), "ghost").await.unwrap_err();
        assert!(matches!(err, HostError::VolumeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_mount_with_multipath_uses_all_portals_and_dm_device() {
        let appliance = MockAppliance::with_portals(vec![
            "10.0.0.1".to_string(),
            "10.0.0.2".to_string(),
        ]);
        let f = fixture(appliance, MockHost::new().with_multipath());
        f.orch.create(&ctx(), "D", VolumeOpts::default()).await.unwrap();

        let mountpoint = f.orch.mount(&ctx(), "D").await.unwrap();
        let (device, _) = f.host.mounted_at(&mountpoint).await.unwrap();
        assert!(device.to_string_lossy().starts_with("/dev/dm-"));

        let calls = f.host.attach_calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].multipath);
        assert_eq!(calls[0].portals, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_waits_out_slow_online_transition() {
        let f = fixture(MockAppliance::new().with_online_lag(3), MockHost::new());
        f.orch.create(&ctx(), "E", VolumeOpts::default()).await.unwrap();
        f.orch.mount(&ctx(), "E").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_fails_when_online_never_arrives() {
        let f = fixture(MockAppliance::new().with_online_lag(50), MockHost::new());
        f.orch.create(&ctx(), "E", VolumeOpts::default()).await.unwrap();
        let err = f.orch.mount(&ctx(), "E").await.unwrap_err();
        assert!(matches!(err, HostError::OnlineTimeout { attempts: 10, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_waits_for_endpoint_readiness() {
        let f = fixture(MockAppliance::new().with_endpoint_lag(2), MockHost::new());
        f.orch.create(&ctx(), "F", VolumeOpts::default()).await.unwrap();
        f.orch.mount(&ctx(), "F").await.unwrap();
    }

    #[tokio::test]
    async fn test_mount_adopts_detected_fs_when_intended_is_empty() {
        let f = fixture(MockAppliance::new(), MockHost::new().with_existing_fs("xfs"));
        f.orch.create(&ctx(), "G", VolumeOpts::default()).await.unwrap();

        // Simulate a volume whose metadata carries no filesystem
        let mut meta = Metadata::new();
        meta.insert(META_PERSISTENCE.to_string(), "manual".to_string());
        meta.insert(META_FSTYPE.to_string(), String::new());
        f.appliance.put_metadata(&ctx(), "G", &meta).await.unwrap();

        let mountpoint = f.orch.mount(&ctx(), "G").await.unwrap();
        let (_, fs) = f.host.mounted_at(&mountpoint).await.unwrap();
        assert_eq!(fs, "xfs");
    }

    #[tokio::test]
    async fn test_mount_defaults_to_ext4_when_nothing_detected() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        f.orch.create(&ctx(), "H", VolumeOpts::default()).await.unwrap();

        let mut meta = Metadata::new();
        meta.insert(META_FSTYPE.to_string(), String::new());
        f.appliance.put_metadata(&ctx(), "H", &meta).await.unwrap();

        let mountpoint = f.orch.mount(&ctx(), "H").await.unwrap();
        let (_, fs) = f.host.mounted_at(&mountpoint).await.unwrap();
        assert_eq!(fs, "ext4");
    }

    #[tokio::test]
    async fn test_unmount_with_auto_persistence_deletes_volume() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        let opts = opts_from(&[("persistenceMode", "auto")]);
        f.orch.create(&ctx(), "D", opts).await.unwrap();
        f.orch.mount(&ctx(), "D").await.unwrap();

        f.orch.unmount(&ctx(), "D").await.unwrap();

        assert!(f.appliance.volume("D").await.is_none());
        assert!(f.host.unmount_count().await >= 1);
        assert!(f.host.detach_count().await >= 1);
    }

    #[tokio::test]
    async fn test_unmount_with_manual_persistence_keeps_volume() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        f.orch.create(&ctx(), "K", VolumeOpts::default()).await.unwrap();
        f.orch.mount(&ctx(), "K").await.unwrap();

        f.orch.unmount(&ctx(), "K").await.unwrap();

        assert!(f.appliance.volume("K").await.is_some());
        assert!(f.host.mounted_at(&PathBuf::from("/mnt/K")).await.is_none());
    }

    #[tokio::test]
    async fn test_acl_is_additive_on_mount_and_subtractive_on_unmount() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        f.orch.create(&ctx(), "S", VolumeOpts::default()).await.unwrap();
        f.appliance
            .seed_acl_entry("S", "/initiators/iqn.other-host")
            .await;

        f.orch.mount(&ctx(), "S").await.unwrap();
        let acl = f.appliance.volume("S").await.unwrap().acl;
        assert_eq!(acl.initiators.len(), 2);
        assert!(acl.contains(&format!("/initiators/{}", HOST_IQN)));

        f.orch.unmount(&ctx(), "S").await.unwrap();
        let acl = f.appliance.volume("S").await.unwrap().acl;
        assert_eq!(acl.initiators.len(), 1);
        assert!(acl.contains("/initiators/iqn.other-host"));
    }

    #[tokio::test]
    async fn test_remove_of_missing_volume_succeeds() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        f.orch.remove(&ctx(), "ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_downgrades_delete_failure_to_success() {
        let f = fixture(MockAppliance::new().with_failing_delete(500), MockHost::new());
        f.orch.create(&ctx(), "R", VolumeOpts::default()).await.unwrap();
        f.orch.remove(&ctx(), "R").await.unwrap();
        // The volume is still there, but the user-facing remove succeeded
        assert!(f.appliance.volume("R").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_unmounts_and_deletes() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        f.orch.create(&ctx(), "R", VolumeOpts::default()).await.unwrap();
        f.orch.mount(&ctx(), "R").await.unwrap();

        f.orch.remove(&ctx(), "R").await.unwrap();
        assert!(f.appliance.volume("R").await.is_none());
        assert!(f.host.mounted_at(&PathBuf::from("/mnt/R")).await.is_none());
    }

    #[tokio::test]
    async fn test_list_derives_mount_points() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        f.orch.create(&ctx(), "b", VolumeOpts::default()).await.unwrap();
        f.orch.create(&ctx(), "a", VolumeOpts::default()).await.unwrap();

        let entries = f.orch.list(&ctx()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[0].mountpoint, PathBuf::from("/mnt/a"));
    }

    #[tokio::test]
    async fn test_get_missing_volume_fails_on_bare_framework() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        let err = f.orch.get(&ctx(), "nope").await.unwrap_err();
        assert!(matches!(err, HostError::VolumeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_implicitly_creates_under_dcos_docker() {
        let config = OrchestratorConfig {
            framework: Framework::DcosDocker,
            ..Default::default()
        };
        let f = fixture_with_config(MockAppliance::new(), MockHost::new(), config);

        let mountpoint = f.orch.get(&ctx(), "implicit").await.unwrap();
        assert_eq!(mountpoint, PathBuf::from("/mnt/implicit"));

        let vol = f.appliance.volume("implicit").await.unwrap();
        assert_eq!(vol.opts.size, 16);
        assert_eq!(vol.opts.replica, 3);
    }

    #[tokio::test]
    async fn test_mount_point_is_deterministic() {
        let f = fixture(MockAppliance::new(), MockHost::new());
        assert_eq!(f.orch.mount_point("x"), PathBuf::from("/mnt/x"));
        assert_eq!(f.orch.mount_point("x"), f.orch.mount_point("x"));
    }
}
