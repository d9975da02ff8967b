use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Default volume size in GiB
pub const DEFAULT_SIZE: u64 = 16;
/// Default filesystem
pub const DEFAULT_FS: &str = "ext4";
/// Default replica count
pub const DEFAULT_REPLICAS: u64 = 3;
/// Default placement mode
pub const DEFAULT_PLACEMENT: &str = "hybrid";

// Option keys as they appear in `docker volume create --opt key=value`
pub const OPT_SIZE: &str = "size";
pub const OPT_REPLICA: &str = "replica";
pub const OPT_TEMPLATE: &str = "template";
pub const OPT_FSTYPE: &str = "fsType";
pub const OPT_MAXIOPS: &str = "maxIops";
pub const OPT_MAXBW: &str = "maxBW";
pub const OPT_PLACEMENT: &str = "placementMode";
pub const OPT_PERSISTENCE: &str = "persistenceMode";
pub const OPT_CLONE_SRC: &str = "cloneSrc";

/// What happens to the volume when it is unmounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PersistenceMode {
    /// Volume persists after unmount
    #[default]
    #[serde(rename = "manual")]
    Manual,
    /// Volume is deleted on unmount
    #[serde(rename = "auto")]
    Auto,
}

impl PersistenceMode {
    /// Parse a persistence mode string. Anything other than "auto" keeps
    /// the volume, matching the conservative default.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "auto" => PersistenceMode::Auto,
            _ => PersistenceMode::Manual,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersistenceMode::Manual => "manual",
            PersistenceMode::Auto => "auto",
        }
    }
}

impl std::fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Volume creation options.
///
/// Zero/empty fields mean "unset"; `apply_defaults` resolves them. The
/// config file may carry a `volume` section with the same shape that acts
/// as a per-deployment fallback between request options and built-ins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeOpts {
    /// Size in GiB
    #[serde(default)]
    pub size: u64,
    /// Replica count
    #[serde(default)]
    pub replica: u64,
    /// Template name (mutually exclusive with explicit sizing and clone)
    #[serde(default)]
    pub template: String,
    /// Filesystem for format/mount
    #[serde(default, rename = "fstype")]
    pub fs_type: String,
    /// Total IOPS cap, 0 = disabled
    #[serde(default, rename = "maxiops")]
    pub max_iops: u64,
    /// Total bandwidth cap, 0 = disabled
    #[serde(default, rename = "maxbw")]
    pub max_bw: u64,
    /// Placement class
    #[serde(default, rename = "placement")]
    pub placement_mode: String,
    /// Keep or delete the volume on unmount
    #[serde(default, rename = "persistence")]
    pub persistence: String,
    /// Existing volume to clone from (highest creation-mode precedence)
    #[serde(default, rename = "clone-src")]
    pub clone_src: String,
}

impl VolumeOpts {
    /// Build options from a docker `--opt` map. Unparsable numeric values
    /// fall back to zero (i.e. unset) rather than failing the request.
    pub fn from_map(opts: &HashMap<String, String>) -> Self {
        let num = |key: &str| -> u64 {
            opts.get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0)
        };
        let text = |key: &str| -> String { opts.get(key).cloned().unwrap_or_default() };

        Self {
            size: num(OPT_SIZE),
            replica: num(OPT_REPLICA),
            template: text(OPT_TEMPLATE),
            fs_type: text(OPT_FSTYPE),
            max_iops: num(OPT_MAXIOPS),
            max_bw: num(OPT_MAXBW),
            placement_mode: text(OPT_PLACEMENT),
            persistence: text(OPT_PERSISTENCE),
            clone_src: text(OPT_CLONE_SRC),
        }
    }

    /// Fill unset fields from a config-file `volume` section.
    pub fn merge_config(&mut self, conf: &VolumeOpts) {
        if self.size == 0 {
            self.size = conf.size;
        }
        if self.replica == 0 {
            self.replica = conf.replica;
        }
        if self.template.is_empty() {
            self.template = conf.template.clone();
        }
        if self.fs_type.is_empty() {
            self.fs_type = conf.fs_type.clone();
        }
        if self.max_iops == 0 {
            self.max_iops = conf.max_iops;
        }
        if self.max_bw == 0 {
            self.max_bw = conf.max_bw;
        }
        if self.placement_mode.is_empty() {
            self.placement_mode = conf.placement_mode.clone();
        }
        if self.persistence.is_empty() {
            self.persistence = conf.persistence.clone();
        }
        if self.clone_src.is_empty() {
            self.clone_src = conf.clone_src.clone();
        }
    }

    /// Resolve any still-unset field to its built-in default.
    pub fn apply_defaults(&mut self) {
        if self.size == 0 {
            debug!("Using default size value of {}", DEFAULT_SIZE);
            self.size = DEFAULT_SIZE;
        }
        if self.fs_type.is_empty() {
            debug!("Using default filesystem value of {}", DEFAULT_FS);
            self.fs_type = DEFAULT_FS.to_string();
        }
        if self.replica == 0 {
            debug!("Using default replica value of {}", DEFAULT_REPLICAS);
            self.replica = DEFAULT_REPLICAS;
        }
        if self.placement_mode.is_empty() {
            debug!("Using default placement value of {}", DEFAULT_PLACEMENT);
            self.placement_mode = DEFAULT_PLACEMENT.to_string();
        }
        if self.persistence.is_empty() {
            debug!(
                "Using default persistence value of {}",
                PersistenceMode::Manual
            );
            self.persistence = PersistenceMode::Manual.as_str().to_string();
        }
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        PersistenceMode::parse(&self.persistence)
    }

    /// Supported option keys with descriptions and defaults, for --print-opts.
    pub fn describe() -> Vec<(&'static str, &'static str, String)> {
        vec![
            (OPT_SIZE, "Volume Size In GiB", DEFAULT_SIZE.to_string()),
            (OPT_REPLICA, "Volume Replicas", DEFAULT_REPLICAS.to_string()),
            (OPT_TEMPLATE, "Volume Template", "None".to_string()),
            (OPT_FSTYPE, "Volume Filesystem", DEFAULT_FS.to_string()),
            (OPT_MAXIOPS, "Volume Max Total IOPS", "0".to_string()),
            (OPT_MAXBW, "Volume Max Total Bandwidth", "0".to_string()),
            (OPT_PLACEMENT, "Volume Placement", DEFAULT_PLACEMENT.to_string()),
            (
                OPT_PERSISTENCE,
                "Volume Persistence",
                PersistenceMode::Manual.to_string(),
            ),
            (OPT_CLONE_SRC, "Volume Source For Clone", "None".to_string()),
        ]
    }
}
