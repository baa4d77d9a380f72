use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::exit;
use crate::inventory::RawInventoryNames;
use crate::topology::{ClusterMode, NodeSizing};

/// Connection settings for the virtualization control plane. Threaded by
/// reference into everything that talks to the API; never exported into the
/// parent process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub endpoint_url: String,
    pub username: String,
    pub password: String,
    pub allow_insecure_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub cluster_name: String,
    /// DNS base domain; only the config-projection flow captures it.
    pub base_domain: Option<String>,
    /// Release identifier of the platform build being deployed.
    pub release: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VipAddresses {
    pub api: String,
    pub ingress: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secrets {
    /// Opaque multi-line registry pull secret, stored verbatim.
    pub pull_secret: String,
    pub ssh_public_key: String,
}

/// Which installer-config schema the projector targets. Always selected
/// explicitly, never inferred from the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaMode {
    #[default]
    Flat,
    FailureDomains,
}

impl std::fmt::Display for SchemaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::FailureDomains => write!(f, "failure-domains"),
        }
    }
}

impl std::str::FromStr for SchemaMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "failure-domains" | "failure_domains" => Ok(Self::FailureDomains),
            _ => Err(anyhow::anyhow!(
                "Unknown schema: {s}. Supported: flat, failure-domains"
            )),
        }
    }
}

/// Everything a run needs, captured interactively or replayed from an
/// answers file. Scalar fields come first so the answers file serializes as
/// valid TOML (values before tables).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub mode: ClusterMode,
    pub worker_count: u32,
    pub session: SessionConfig,
    pub identity: ClusterIdentity,
    pub inventory: RawInventoryNames,
    pub master_sizing: NodeSizing,
    pub worker_sizing: NodeSizing,
    /// Only the config-projection flow captures these.
    pub vips: Option<VipAddresses>,
    pub secrets: Option<Secrets>,
}

pub fn parse_answers(file: &str) -> Result<DeploymentConfig> {
    let answers = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(err) => exit!(err, "Could not read answers file {}", file),
    };

    let answers: Result<DeploymentConfig, toml::de::Error> = toml::from_str(answers.as_str());
    let answers = match answers {
        Ok(a) => a,
        Err(err) => exit!(err, "Could not parse answers file {}", file),
    };

    info!("answers file parsed");
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mode_parsing() {
        assert_eq!("flat".parse::<SchemaMode>().unwrap(), SchemaMode::Flat);
        assert_eq!(
            "failure-domains".parse::<SchemaMode>().unwrap(),
            SchemaMode::FailureDomains
        );
        assert!("vintage".parse::<SchemaMode>().is_err());
    }

    #[test]
    fn answers_roundtrip() {
        let config = DeploymentConfig {
            session: SessionConfig {
                endpoint_url: "https://vc.lab.local".into(),
                username: "administrator@vsphere.local".into(),
                password: "hunter2".into(),
                allow_insecure_tls: true,
            },
            identity: ClusterIdentity {
                cluster_name: "lab".into(),
                base_domain: Some("lab.local".into()),
                release: "4.15.2".into(),
            },
            inventory: RawInventoryNames {
                datacenter: "DC1".into(),
                cluster: "C1".into(),
                folder: "lab-vms".into(),
                datastore: "datastore1".into(),
                network: "VM Network".into(),
            },
            mode: ClusterMode::Standard,
            worker_count: 3,
            master_sizing: NodeSizing {
                cpus: 4,
                ram_gb: 16,
                disk_gb: 120,
            },
            worker_sizing: NodeSizing {
                cpus: 4,
                ram_gb: 16,
                disk_gb: 200,
            },
            vips: None,
            secrets: None,
        };

        let serialized = toml::to_string(&config).unwrap();
        let parsed: DeploymentConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.mode, ClusterMode::Standard);
        assert_eq!(parsed.worker_count, 3);
        assert_eq!(parsed.master_sizing.ram_gb, 16);
    }
}
