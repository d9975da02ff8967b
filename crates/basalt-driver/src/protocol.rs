use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handshake response advertising the implemented plugin interface.
#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    #[serde(rename = "Implements")]
    pub implements: Vec<&'static str>,
}

impl ActivateResponse {
    pub fn volume_driver() -> Self {
        Self {
            implements: vec!["VolumeDriver"],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Opts", default)]
    pub opts: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MountRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ID", default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct UnmountRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ID", default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct GetRequest {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    #[serde(rename = "Name")]
    pub name: String,
}

/// Volume summary returned by Get and List.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Mountpoint")]
    pub mountpoint: String,
    #[serde(rename = "Status")]
    pub status: HashMap<String, serde_json::Value>,
}

/// Response carrying only an error string (empty on success).
#[derive(Debug, Serialize)]
pub struct ErrResponse {
    #[serde(rename = "Err")]
    pub err: String,
}

impl ErrResponse {
    pub fn ok() -> Self {
        Self { err: String::new() }
    }

    pub fn error(e: impl std::fmt::Display) -> Self {
        Self { err: e.to_string() }
    }
}

#[derive(Debug, Serialize)]
pub struct MountResponse {
    #[serde(rename = "Mountpoint")]
    pub mountpoint: String,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Debug, Serialize)]
pub struct GetResponse {
    #[serde(rename = "Volume", skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeInfo>,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    #[serde(rename = "Volumes")]
    pub volumes: Vec<VolumeInfo>,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Debug, Serialize)]
pub struct Capability {
    #[serde(rename = "Scope")]
    pub scope: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    #[serde(rename = "Capabilities")]
    pub capabilities: Capability,
}

impl CapabilitiesResponse {
    /// Volumes are not pinned to the creating engine.
    pub fn global() -> Self {
        Self {
            capabilities: Capability { scope: "global" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_parses_docker_wire_shape() {
        let req: CreateRequest = serde_json::from_str(
            r#"{"Name": "data", "Opts": {"size": "50", "fsType": "xfs"}}"#,
        )
        .unwrap();
        assert_eq!(req.name, "data");
        assert_eq!(req.opts.unwrap().get("size").unwrap(), "50");

        let req: CreateRequest = serde_json::from_str(r#"{"Name": "data", "Opts": null}"#).unwrap();
        assert!(req.opts.is_none());
    }

    #[test]
    fn test_mount_request_tolerates_missing_id() {
        let req: MountRequest = serde_json::from_str(r#"{"Name": "data"}"#).unwrap();
        assert!(req.id.is_empty());
    }

    #[test]
    fn test_responses_use_pascal_case_keys() {
        let json = serde_json::to_string(&MountResponse {
            mountpoint: "/mnt/data".to_string(),
            err: String::new(),
        })
        .unwrap();
        assert!(json.contains(r#""Mountpoint":"/mnt/data""#));
        assert!(json.contains(r#""Err":"""#));

        let json = serde_json::to_string(&CapabilitiesResponse::global()).unwrap();
        assert!(json.contains(r#""Scope":"global""#));

        let json = serde_json::to_string(&ActivateResponse::volume_driver()).unwrap();
        assert!(json.contains(r#""Implements":["VolumeDriver"]"#));
    }

    #[test]
    fn test_get_response_omits_volume_on_error() {
        let json = serde_json::to_string(&GetResponse {
            volume: None,
            err: "Volume not found: x".to_string(),
        })
        .unwrap();
        assert!(!json.contains("Volume\""));
        assert!(json.contains("not found"));
    }
}
