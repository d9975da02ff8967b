use crate::error::{CoreError, Result};
use crate::options::VolumeOpts;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Container framework the agent is deployed under.
///
/// `DcosDocker` changes Get semantics: docker under DCOS cannot drive the
/// full volume lifecycle, so the agent implicitly creates missing volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framework {
    #[default]
    Bare,
    DcosDocker,
    DcosMesos,
}

impl Framework {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dcos-docker" => Framework::DcosDocker,
            "dcos-mesos" => Framework::DcosMesos,
            _ => Framework::Bare,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Bare => "bare",
            Framework::DcosDocker => "dcos-docker",
            Framework::DcosMesos => "dcos-mesos",
        }
    }

    pub fn implicit_create(&self) -> bool {
        matches!(self, Framework::DcosDocker)
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent configuration, loaded from a JSON config file.
///
/// Generate a template with `basalt --genconfig bare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Management address of the storage appliance
    #[serde(rename = "datera-cluster")]
    pub cluster: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub ssl: bool,
    /// Tenant path on the appliance (default "/root")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant: String,
    /// OS user whose primary group owns the plugin socket (default "root")
    #[serde(rename = "os-user", default, skip_serializing_if = "String::is_empty")]
    pub os_user: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub framework: String,
    /// Optional per-deployment volume option defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeOpts>,
}

impl AgentConfig {
    /// Load and validate a config file, applying field defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| CoreError::config_io(path.display().to_string(), e.to_string()))?;
        let mut conf: AgentConfig = serde_json::from_str(&data)
            .map_err(|e| CoreError::config_io(path.display().to_string(), e.to_string()))?;
        conf.apply_defaults();
        conf.validate()?;
        Ok(conf)
    }

    pub fn apply_defaults(&mut self) {
        if self.tenant.is_empty() {
            self.tenant = "/root".to_string();
        }
        if self.os_user.is_empty() {
            self.os_user = "root".to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster.is_empty() {
            return Err(CoreError::invalid_config(
                "'datera-cluster' must be set",
                "Set 'datera-cluster' to the appliance management address, e.g. \"1.1.1.1\"",
            ));
        }
        if self.username.is_empty() {
            return Err(CoreError::invalid_config(
                "'username' must be set",
                "Set 'username' to an appliance account with volume management rights",
            ));
        }
        Ok(())
    }

    pub fn framework(&self) -> Framework {
        Framework::parse(&self.framework)
    }

    /// Config template used by --genconfig.
    pub fn template(framework: Framework) -> Self {
        Self {
            cluster: "1.1.1.1".to_string(),
            username: "my-user".to_string(),
            password: "my-pass".to_string(),
            ssl: true,
            tenant: "/root".to_string(),
            os_user: "root".to_string(),
            debug: false,
            framework: framework.as_str().to_string(),
            volume: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{"datera-cluster": "10.0.1.1", "username": "admin", "password": "s3cret"}"#
    }

    #[test]
    fn test_parse_minimal_config_applies_defaults() {
        let mut conf: AgentConfig = serde_json::from_str(minimal_json()).unwrap();
        conf.apply_defaults();
        conf.validate().unwrap();
        assert_eq!(conf.cluster, "10.0.1.1");
        assert_eq!(conf.tenant, "/root");
        assert_eq!(conf.os_user, "root");
        assert!(!conf.ssl);
        assert_eq!(conf.framework(), Framework::Bare);
    }

    #[test]
    fn test_missing_cluster_is_rejected() {
        let mut conf: AgentConfig =
            serde_json::from_str(r#"{"datera-cluster": "", "username": "a", "password": "b"}"#)
                .unwrap();
        conf.apply_defaults();
        assert!(matches!(
            conf.validate().unwrap_err(),
            CoreError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn test_missing_username_is_rejected() {
        let mut conf: AgentConfig =
            serde_json::from_str(r#"{"datera-cluster": "1.1.1.1", "username": "", "password": "b"}"#)
                .unwrap();
        conf.apply_defaults();
        assert!(conf.validate().is_err());
    }

    #[test]
    fn test_volume_section_round_trips() {
        let json = r#"{
            "datera-cluster": "1.1.1.1",
            "username": "admin",
            "password": "pw",
            "framework": "dcos-docker",
            "volume": {"size": 32, "fstype": "xfs"}
        }"#;
        let conf: AgentConfig = serde_json::from_str(json).unwrap();
        let vol = conf.volume.as_ref().unwrap();
        assert_eq!(vol.size, 32);
        assert_eq!(vol.fs_type, "xfs");
        assert!(conf.framework().implicit_create());
    }

    #[test]
    fn test_framework_parse() {
        assert_eq!(Framework::parse("dcos-docker"), Framework::DcosDocker);
        assert_eq!(Framework::parse("DCOS-MESOS"), Framework::DcosMesos);
        assert_eq!(Framework::parse("bare"), Framework::Bare);
        assert_eq!(Framework::parse(""), Framework::Bare);
    }

    #[test]
    fn test_template_validates() {
        let conf = AgentConfig::template(Framework::DcosDocker);
        conf.validate().unwrap();
        assert_eq!(conf.framework(), Framework::DcosDocker);
    }
}
