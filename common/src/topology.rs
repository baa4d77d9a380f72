use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Control-plane node count, fixed for both modes.
pub const MASTER_COUNT: u32 = 3;
pub const DEFAULT_WORKER_COUNT: u32 = 3;
pub const WORKER_COUNT_MIN: u32 = 1;
pub const WORKER_COUNT_MAX: u32 = 5;

/// OS disk size used by the VM-creation flow. There the per-role `disk_gb`
/// sizes the data disk; only the config-projection flow puts `disk_gb` on the
/// OS disk.
pub const OS_DISK_GB: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    /// All 3 nodes carry both the control-plane and the worker role.
    Compact,
    /// 3 dedicated control-plane nodes plus 1-5 dedicated workers.
    Standard,
}

impl ClusterMode {
    /// Maps the menu selector (1 = compact, 2 = standard).
    pub fn from_selector(selector: u32) -> Result<Self, ValidationError> {
        match selector {
            1 => Ok(Self::Compact),
            2 => Ok(Self::Standard),
            other => Err(ValidationError::InvalidSelection(other.to_string())),
        }
    }
}

impl std::fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compact => write!(f, "compact"),
            Self::Standard => write!(f, "standard"),
        }
    }
}

impl std::str::FromStr for ClusterMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "standard" => Ok(Self::Standard),
            _ => Err(anyhow::anyhow!("Unknown mode: {s}. Supported: compact, standard")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Worker,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Worker => "worker",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    pub mode: ClusterMode,
    pub master_count: u32,
    pub worker_count: u32,
}

/// Total for any valid mode. Compact forces the worker count to zero no matter
/// what was captured; Standard falls back to the default on empty input.
pub fn resolve(mode: ClusterMode, worker_count: Option<u32>) -> ClusterTopology {
    let worker_count = match mode {
        ClusterMode::Compact => 0,
        ClusterMode::Standard => worker_count.unwrap_or(DEFAULT_WORKER_COUNT),
    };
    ClusterTopology {
        mode,
        master_count: MASTER_COUNT,
        worker_count,
    }
}

impl ClusterTopology {
    /// Whether nodes of this role get a second (data) virtual disk in the
    /// VM-creation flow.
    pub fn second_disk_required(&self, role: NodeRole) -> bool {
        match self.mode {
            ClusterMode::Compact => true,
            ClusterMode::Standard => role == NodeRole::Worker,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeSizing {
    pub cpus: u32,
    pub ram_gb: u32,
    pub disk_gb: u32,
}

impl NodeSizing {
    /// Memory in MB, computed before any document write ever sees it.
    pub fn ram_mb(&self) -> u32 {
        self.ram_gb * 1024
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SizingRanges {
    pub cpus: FieldRange,
    pub ram_gb: FieldRange,
    pub disk_gb: FieldRange,
}

/// Role defaults. Compact masters get the widest envelope since they double as
/// workers. The compact worker row is zero-filled and never prompted.
pub fn default_sizing(mode: ClusterMode, role: NodeRole) -> NodeSizing {
    match (mode, role) {
        (ClusterMode::Compact, NodeRole::Master) => NodeSizing {
            cpus: 8,
            ram_gb: 32,
            disk_gb: 200,
        },
        (ClusterMode::Compact, NodeRole::Worker) => NodeSizing::default(),
        (ClusterMode::Standard, NodeRole::Master) => NodeSizing {
            cpus: 4,
            ram_gb: 16,
            disk_gb: 120,
        },
        (ClusterMode::Standard, NodeRole::Worker) => NodeSizing {
            cpus: 4,
            ram_gb: 16,
            disk_gb: 200,
        },
    }
}

pub fn sizing_ranges(mode: ClusterMode, role: NodeRole) -> SizingRanges {
    match (mode, role) {
        (ClusterMode::Compact, NodeRole::Master) => SizingRanges {
            cpus: FieldRange { min: 6, max: 32 },
            ram_gb: FieldRange { min: 16, max: 256 },
            disk_gb: FieldRange {
                min: 100,
                max: 2000,
            },
        },
        (ClusterMode::Standard, NodeRole::Master) => SizingRanges {
            cpus: FieldRange { min: 4, max: 16 },
            ram_gb: FieldRange { min: 16, max: 64 },
            disk_gb: FieldRange {
                min: 100,
                max: 1000,
            },
        },
        // Compact workers are never prompted; the row only exists so callers
        // stay total over (mode, role).
        (_, NodeRole::Worker) => SizingRanges {
            cpus: FieldRange { min: 2, max: 16 },
            ram_gb: FieldRange { min: 8, max: 128 },
            disk_gb: FieldRange {
                min: 100,
                max: 2000,
            },
        },
    }
}

/// One VM to create. `disk_gb` from the sizing becomes the data disk here;
/// the OS disk is always [`OS_DISK_GB`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub role: NodeRole,
    pub cpus: u32,
    pub ram_gb: u32,
    pub os_disk_gb: u32,
    pub data_disk_gb: Option<u32>,
    /// Datastore-relative path of the boot image every node boots from.
    pub boot_image: String,
}

/// Cross product of the topology and the per-role sizing: masters first, then
/// workers, with deterministic `<cluster>-<role>-0<n>` names.
pub fn node_specs(
    topology: &ClusterTopology,
    master: NodeSizing,
    worker: NodeSizing,
    cluster_name: &str,
    boot_image: &str,
) -> Vec<NodeSpec> {
    let mut specs = Vec::new();
    for (role, sizing, count) in [
        (NodeRole::Master, master, topology.master_count),
        (NodeRole::Worker, worker, topology.worker_count),
    ] {
        for index in 1..=count {
            specs.push(NodeSpec {
                name: format!("{cluster_name}-{}-{index:02}", role.as_str()),
                role,
                cpus: sizing.cpus,
                ram_gb: sizing.ram_gb,
                os_disk_gb: OS_DISK_GB,
                data_disk_gb: topology
                    .second_disk_required(role)
                    .then_some(sizing.disk_gb),
                boot_image: boot_image.to_owned(),
            });
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_forces_zero_workers() {
        for input in [None, Some(0), Some(3), Some(5)] {
            let t = resolve(ClusterMode::Compact, input);
            assert_eq!(t.worker_count, 0);
            assert_eq!(t.master_count, 3);
        }
    }

    #[test]
    fn standard_defaults_to_three_workers() {
        assert_eq!(resolve(ClusterMode::Standard, None).worker_count, 3);
        assert_eq!(resolve(ClusterMode::Standard, Some(5)).worker_count, 5);
    }

    #[test]
    fn mode_selector() {
        assert_eq!(ClusterMode::from_selector(1).unwrap(), ClusterMode::Compact);
        assert_eq!(
            ClusterMode::from_selector(2).unwrap(),
            ClusterMode::Standard
        );
        assert!(ClusterMode::from_selector(3).is_err());
    }

    #[test]
    fn ram_conversion_is_exact() {
        for ram_gb in [8, 16, 32, 64, 128] {
            let sizing = NodeSizing {
                cpus: 4,
                ram_gb,
                disk_gb: 120,
            };
            assert_eq!(sizing.ram_mb(), ram_gb * 1024);
        }
        assert_eq!(
            NodeSizing {
                cpus: 4,
                ram_gb: 16,
                disk_gb: 120
            }
            .ram_mb(),
            16384
        );
    }

    #[test]
    fn compact_cluster_roster() {
        let topology = resolve(ClusterMode::Compact, Some(4));
        let specs = node_specs(
            &topology,
            default_sizing(ClusterMode::Compact, NodeRole::Master),
            default_sizing(ClusterMode::Compact, NodeRole::Worker),
            "lab",
            "lab/boot.iso",
        );

        assert_eq!(specs.len(), 3);
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["lab-master-01", "lab-master-02", "lab-master-03"]);
        for spec in &specs {
            assert_eq!(spec.os_disk_gb, 120);
            assert_eq!(spec.data_disk_gb, Some(200));
        }
    }

    #[test]
    fn standard_cluster_roster() {
        let topology = resolve(ClusterMode::Standard, Some(3));
        let specs = node_specs(
            &topology,
            default_sizing(ClusterMode::Standard, NodeRole::Master),
            default_sizing(ClusterMode::Standard, NodeRole::Worker),
            "prod",
            "prod/boot.iso",
        );

        assert_eq!(specs.len(), 6);
        assert_eq!(specs[0].name, "prod-master-01");
        assert_eq!(specs[3].name, "prod-worker-01");
        assert_eq!(specs[5].name, "prod-worker-03");

        for spec in &specs {
            match spec.role {
                NodeRole::Master => assert_eq!(spec.data_disk_gb, None),
                NodeRole::Worker => assert_eq!(spec.data_disk_gb, Some(200)),
            }
        }
    }

    #[test]
    fn data_disk_never_resizes_os_disk() {
        // The VM-creation flow keeps the OS disk fixed; the sized disk is the
        // second one. The projection flow has no NodeSpec at all, it writes
        // disk_gb straight to the document (covered in the projector tests).
        let topology = resolve(ClusterMode::Compact, None);
        let sizing = NodeSizing {
            cpus: 8,
            ram_gb: 32,
            disk_gb: 500,
        };
        let specs = node_specs(&topology, sizing, NodeSizing::default(), "x", "x/boot.iso");
        assert_eq!(specs[0].os_disk_gb, 120);
        assert_eq!(specs[0].data_disk_gb, Some(500));
    }

    #[test]
    fn sizing_defaults_sit_inside_their_ranges() {
        for (mode, role) in [
            (ClusterMode::Compact, NodeRole::Master),
            (ClusterMode::Standard, NodeRole::Master),
            (ClusterMode::Standard, NodeRole::Worker),
        ] {
            let d = default_sizing(mode, role);
            let r = sizing_ranges(mode, role);
            assert!((r.cpus.min..=r.cpus.max).contains(&d.cpus));
            assert!((r.ram_gb.min..=r.ram_gb.max).contains(&d.ram_gb));
            assert!((r.disk_gb.min..=r.disk_gb.max).contains(&d.disk_gb));
        }
    }
}
