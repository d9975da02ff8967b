use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed logical name of the per-volume storage endpoint.
pub const STORAGE_ENDPOINT_NAME: &str = "storage-1";
/// Fixed logical name of the endpoint's single child block volume.
pub const BLOCK_VOLUME_NAME: &str = "volume-1";

/// Metadata key for the persistence mode ("manual" or "auto").
pub const META_PERSISTENCE: &str = "persistenceMode";
/// Metadata key for the filesystem type.
pub const META_FSTYPE: &str = "fsType";

/// Opaque key/value map attached to a volume on the appliance.
pub type Metadata = HashMap<String, String>;

/// Volume admin state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminState {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "offline")]
    Offline,
}

impl AdminState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminState::Online => "online",
            AdminState::Offline => "offline",
        }
    }
}

impl std::fmt::Display for AdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// iSCSI access coordinates published by a storage endpoint once online
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Access {
    #[serde(default)]
    pub iqn: String,
    #[serde(default)]
    pub ips: Vec<String>,
}

/// Child block volume of a storage endpoint. The server-assigned UUID is
/// stable for the lifetime of the volume and names the host device under
/// /dev/disk/by-uuid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockVolume {
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub replica_count: u64,
    #[serde(default)]
    pub placement_mode: String,
}

/// Appliance-side object exposing a volume over iSCSI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageEndpoint {
    pub name: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub block_volumes: Vec<BlockVolume>,
}

/// A logical volume as reported by the appliance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    #[serde(default)]
    pub admin_state: String,
    #[serde(default)]
    pub storage_endpoints: Vec<StorageEndpoint>,
}

impl Volume {
    pub fn is_online(&self) -> bool {
        self.admin_state == AdminState::Online.as_str()
    }
}

/// Flattened view of a storage endpoint consumed by the attach pipeline.
#[derive(Debug, Clone, Default)]
pub struct EndpointInfo {
    pub iqn: String,
    pub portals: Vec<String>,
    pub volume_uuid: String,
}

impl EndpointInfo {
    /// Whether the endpoint has published everything login needs.
    pub fn ready(&self) -> bool {
        !self.iqn.is_empty() && !self.portals.is_empty() && !self.volume_uuid.is_empty()
    }
}

impl From<&StorageEndpoint> for EndpointInfo {
    fn from(se: &StorageEndpoint) -> Self {
        Self {
            iqn: se.access.iqn.clone(),
            portals: se.access.ips.clone(),
            volume_uuid: se
                .block_volumes
                .first()
                .map(|bv| bv.uuid.clone())
                .unwrap_or_default(),
        }
    }
}

/// A host initiator registered on the appliance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Initiator {
    /// Human-readable name (generated on creation)
    pub name: String,
    /// The initiator IQN
    pub id: String,
    /// Stable reference path, e.g. "/initiators/iqn.1993-08.org.debian:01:abc"
    #[serde(default)]
    pub path: String,
}

/// Reference to an initiator within an ACL policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorRef {
    pub path: String,
}

/// Per-storage-endpoint set of initiators permitted to log in
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AclPolicy {
    #[serde(default)]
    pub initiators: Vec<InitiatorRef>,
}

impl AclPolicy {
    pub fn contains(&self, path: &str) -> bool {
        self.initiators.iter().any(|i| i.path == path)
    }
}
