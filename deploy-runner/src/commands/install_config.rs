use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde_yaml::Value;

use common::config::{DeploymentConfig, SchemaMode};
use common::error::DeployError;
use common::exit;
use common::inventory::InventoryPath;
use common::keypath;
use common::topology::{self, ClusterMode};

use crate::args::{Cli, InstallConfigArgs};
use crate::prompts::{self, Flow};
use crate::summary;

pub const TEMPLATE_PATH: &str = "templates/install-config-template.yaml";

pub async fn run(args: &InstallConfigArgs, cli: &Cli) -> Result<()> {
    let schema: SchemaMode = args.schema.parse()?;

    // The template gates the whole flow; fail before capturing anything else
    // is written anywhere.
    let template = load_template(Path::new(TEMPLATE_PATH))?;

    let config = super::load_config(cli, Flow::InstallConfig)?;
    let paths = InventoryPath::derive(&config.inventory);

    summary::print_section("Installer configuration");
    summary::print_kv("cluster", &config.identity.cluster_name);
    summary::print_kv("schema", &schema.to_string());
    summary::print_kv("mode", &config.mode.to_string());
    summary::print_kv("folder", &paths.folder_path);

    if !prompts::proceed_gate("Write the installer configuration?")? {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    let doc = project(&template, &config, schema)?;
    let dest_dir = PathBuf::from(&args.output_dir).join(&config.identity.cluster_name);
    let dest = write_document(&doc, &dest_dir)?;
    summary::print_success(&format!("Wrote {}", dest.display()));

    let dump = dest_dir.join("cluster-state.env");
    summary::write_state_dump(&dump, &config, &paths, &[], args.dump_secrets)?;
    summary::print_success(&format!("Wrote {}", dump.display()));
    summary::print_kv(
        "next",
        &format!("point your installer at {}", dest_dir.display()),
    );
    Ok(())
}

fn load_template(path: &Path) -> Result<Value> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => {
            return Err(DeployError::PrerequisiteMissing {
                what: format!("installer-config template {}", path.display()),
                remedy: format!(
                    "Restore {TEMPLATE_PATH} from the repository checkout and re-run."
                ),
            }
            .into())
        }
    };
    Ok(serde_yaml::from_str(&raw)?)
}

/// Host part of the endpoint URL; the document schemas want a server name,
/// not a URL.
fn endpoint_host(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

fn write(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    keypath::set(doc, path, value)
        .map_err(|err| anyhow::anyhow!("installer-config write failed at `{path}`: {err}"))
}

/// Projects the resolved deployment onto the template. Writes run in
/// dependency order; derived values (RAM in MB) are computed before the
/// write, and secrets go last, verbatim.
pub fn project(
    template: &Value,
    config: &DeploymentConfig,
    schema: SchemaMode,
) -> Result<Value> {
    let Some(secrets) = &config.secrets else {
        exit!(
            "missing secrets",
            "The projection flow needs a pull secret and an SSH key"
        );
    };
    let Some(vips) = &config.vips else {
        exit!("missing VIPs", "The projection flow needs API and ingress VIPs");
    };
    let Some(base_domain) = &config.identity.base_domain else {
        exit!("missing base domain", "The projection flow needs a base DNS domain");
    };

    let resolved = topology::resolve(config.mode, Some(config.worker_count));
    let paths = InventoryPath::derive(&config.inventory);
    let host = endpoint_host(&config.session.endpoint_url);

    // GB -> MB up front; the document only ever sees MB.
    let master_ram_mb = config.master_sizing.ram_mb();
    let worker_ram_mb = config.worker_sizing.ram_mb();

    let mut doc = template.clone();

    write(&mut doc, "metadata.name", config.identity.cluster_name.as_str().into())?;
    write(&mut doc, "baseDomain", base_domain.as_str().into())?;

    match schema {
        SchemaMode::Flat => {
            write(&mut doc, "platform.vsphere.apiVIP", vips.api.as_str().into())?;
            write(&mut doc, "platform.vsphere.ingressVIP", vips.ingress.as_str().into())?;
            write(&mut doc, "platform.vsphere.vCenter", host.into())?;
            write(&mut doc, "platform.vsphere.username", config.session.username.as_str().into())?;
            write(&mut doc, "platform.vsphere.password", config.session.password.as_str().into())?;
            write(&mut doc, "platform.vsphere.datacenter", config.inventory.datacenter.as_str().into())?;
            write(&mut doc, "platform.vsphere.defaultDatastore", config.inventory.datastore.as_str().into())?;
            write(&mut doc, "platform.vsphere.cluster", config.inventory.cluster.as_str().into())?;
            write(&mut doc, "platform.vsphere.network", config.inventory.network.as_str().into())?;
            write(&mut doc, "platform.vsphere.folder", paths.folder_path.as_str().into())?;
        }
        SchemaMode::FailureDomains => {
            write(&mut doc, "platform.vsphere.apiVIPs[0]", vips.api.as_str().into())?;
            write(&mut doc, "platform.vsphere.ingressVIPs[0]", vips.ingress.as_str().into())?;
            write(&mut doc, "platform.vsphere.vcenters[0].server", host.into())?;
            write(&mut doc, "platform.vsphere.vcenters[0].user", config.session.username.as_str().into())?;
            write(&mut doc, "platform.vsphere.vcenters[0].password", config.session.password.as_str().into())?;
            write(&mut doc, "platform.vsphere.vcenters[0].datacenters[0]", config.inventory.datacenter.as_str().into())?;

            let fd = "platform.vsphere.failureDomains[0]";
            write(&mut doc, &format!("{fd}.name"), "primary".into())?;
            write(&mut doc, &format!("{fd}.region"), "region-1".into())?;
            write(&mut doc, &format!("{fd}.zone"), "zone-1".into())?;
            write(&mut doc, &format!("{fd}.server"), host.into())?;
            write(&mut doc, &format!("{fd}.topology.datacenter"), config.inventory.datacenter.as_str().into())?;
            write(&mut doc, &format!("{fd}.topology.computeCluster"), paths.cluster_path.as_str().into())?;
            write(&mut doc, &format!("{fd}.topology.datastore"), paths.datastore_path.as_str().into())?;
            write(&mut doc, &format!("{fd}.topology.networks[0]"), config.inventory.network.as_str().into())?;
            write(&mut doc, &format!("{fd}.topology.folder"), paths.folder_path.as_str().into())?;
            write(&mut doc, &format!("{fd}.topology.resourcePool"), paths.resource_pool_path.as_str().into())?;
        }
    }

    write(&mut doc, "controlPlane.replicas", resolved.master_count.into())?;
    let compute_replicas = match config.mode {
        ClusterMode::Compact => 0,
        ClusterMode::Standard => resolved.worker_count,
    };
    write(&mut doc, "compute[0].replicas", compute_replicas.into())?;

    // Here disk_gb sizes the OS disk directly; there is no data-disk concept
    // in this flow.
    write(&mut doc, "controlPlane.platform.vsphere.cpus", config.master_sizing.cpus.into())?;
    write(&mut doc, "controlPlane.platform.vsphere.memoryMB", master_ram_mb.into())?;
    write(&mut doc, "controlPlane.platform.vsphere.osDisk.diskSizeGB", config.master_sizing.disk_gb.into())?;
    if config.mode == ClusterMode::Standard {
        write(&mut doc, "compute[0].platform.vsphere.cpus", config.worker_sizing.cpus.into())?;
        write(&mut doc, "compute[0].platform.vsphere.memoryMB", worker_ram_mb.into())?;
        write(&mut doc, "compute[0].platform.vsphere.osDisk.diskSizeGB", config.worker_sizing.disk_gb.into())?;
    }

    // Secrets last and verbatim; no re-encoding or trimming.
    write(&mut doc, "pullSecret", secrets.pull_secret.as_str().into())?;
    write(&mut doc, "sshKey", secrets.ssh_public_key.as_str().into())?;

    Ok(doc)
}

/// Writes the document under `<dest_dir>/install-config.yaml`, preserving an
/// existing one as a timestamped copy first.
pub fn write_document(doc: &Value, dest_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join("install-config.yaml");
    if dest.exists() {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let backup = dest_dir.join(format!("install-config.{stamp}.bak.yaml"));
        fs::copy(&dest, &backup)?;
        tracing::info!("previous document kept as {}", backup.display());
    }
    fs::write(&dest, serde_yaml::to_string(doc)?)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use common::config::{ClusterIdentity, Secrets, SessionConfig, VipAddresses};
    use common::inventory::RawInventoryNames;
    use common::topology::NodeSizing;

    use super::*;

    const TEMPLATE: &str = r#"
apiVersion: v1
baseDomain: placeholder.example
metadata:
  name: placeholder
controlPlane:
  name: master
  replicas: 3
compute:
  - name: worker
    replicas: 0
networking:
  networkType: OVNKubernetes
platform: {}
pullSecret: ""
sshKey: ""
"#;

    fn template() -> Value {
        serde_yaml::from_str(TEMPLATE).unwrap()
    }

    fn test_config(mode: ClusterMode, worker_count: u32) -> DeploymentConfig {
        DeploymentConfig {
            mode,
            worker_count,
            session: SessionConfig {
                endpoint_url: "https://vc.lab.local/sdk".into(),
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
            master_sizing: NodeSizing {
                cpus: 4,
                ram_gb: 16,
                disk_gb: 150,
            },
            worker_sizing: NodeSizing {
                cpus: 8,
                ram_gb: 24,
                disk_gb: 300,
            },
            vips: Some(VipAddresses {
                api: "10.0.0.5".into(),
                ingress: "10.0.0.6".into(),
            }),
            secrets: Some(Secrets {
                pull_secret: "{\"auths\":{\n  \"registry.example\": {\"auth\": \"Zm9v\"}\n}}".into(),
                ssh_public_key: "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIDWoEncFRYnwMifsDSKp7u2c8XJNvLiXBAmvLYZf6DAm admin@lab".into(),
            }),
        }
    }

    fn get_str(doc: &Value, path: &str) -> String {
        keypath::get(doc, path)
            .unwrap()
            .unwrap_or_else(|| panic!("missing {path}"))
            .as_str()
            .unwrap_or_else(|| panic!("{path} is not a string"))
            .to_owned()
    }

    fn get_u64(doc: &Value, path: &str) -> u64 {
        keypath::get(doc, path)
            .unwrap()
            .unwrap_or_else(|| panic!("missing {path}"))
            .as_u64()
            .unwrap_or_else(|| panic!("{path} is not a number"))
    }

    #[test]
    fn flat_schema_projection() {
        let config = test_config(ClusterMode::Standard, 3);
        let doc = project(&template(), &config, SchemaMode::Flat).unwrap();

        assert_eq!(get_str(&doc, "metadata.name"), "lab");
        assert_eq!(get_str(&doc, "baseDomain"), "lab.local");
        assert_eq!(get_str(&doc, "platform.vsphere.vCenter"), "vc.lab.local");
        assert_eq!(get_str(&doc, "platform.vsphere.folder"), "/DC1/vm/lab-vms");
        assert_eq!(get_str(&doc, "platform.vsphere.apiVIP"), "10.0.0.5");
        assert_eq!(get_u64(&doc, "controlPlane.replicas"), 3);
        assert_eq!(get_u64(&doc, "compute[0].replicas"), 3);
    }

    #[test]
    fn failure_domains_schema_projection() {
        let config = test_config(ClusterMode::Standard, 2);
        let doc = project(&template(), &config, SchemaMode::FailureDomains).unwrap();

        assert_eq!(
            get_str(&doc, "platform.vsphere.vcenters[0].server"),
            "vc.lab.local"
        );
        assert_eq!(
            get_str(&doc, "platform.vsphere.vcenters[0].datacenters[0]"),
            "DC1"
        );
        assert_eq!(
            get_str(
                &doc,
                "platform.vsphere.failureDomains[0].topology.resourcePool"
            ),
            "/DC1/host/C1/Resources"
        );
        assert_eq!(
            get_str(&doc, "platform.vsphere.failureDomains[0].topology.networks[0]"),
            "VM Network"
        );
        assert_eq!(get_str(&doc, "platform.vsphere.apiVIPs[0]"), "10.0.0.5");
        assert_eq!(get_u64(&doc, "compute[0].replicas"), 2);
        // The flat keys never leak into the failure-domains shape.
        assert_eq!(keypath::get(&doc, "platform.vsphere.vCenter").unwrap(), None);
    }

    #[test]
    fn ram_is_written_in_mb() {
        let config = test_config(ClusterMode::Standard, 3);
        let doc = project(&template(), &config, SchemaMode::Flat).unwrap();
        assert_eq!(
            get_u64(&doc, "controlPlane.platform.vsphere.memoryMB"),
            16 * 1024
        );
        assert_eq!(
            get_u64(&doc, "compute[0].platform.vsphere.memoryMB"),
            24 * 1024
        );
    }

    #[test]
    fn disk_gb_sizes_the_os_disk_in_this_flow() {
        // The projection flow has no second-disk concept; disk_gb goes to the
        // OS disk. The VM-creation flow does the opposite (fixed 120 GB OS
        // disk, disk_gb on the data disk) - covered by the topology tests.
        let config = test_config(ClusterMode::Standard, 3);
        let doc = project(&template(), &config, SchemaMode::Flat).unwrap();
        assert_eq!(
            get_u64(&doc, "controlPlane.platform.vsphere.osDisk.diskSizeGB"),
            150
        );
        assert_eq!(
            get_u64(&doc, "compute[0].platform.vsphere.osDisk.diskSizeGB"),
            300
        );
        for absent in [
            "controlPlane.platform.vsphere.dataDisk",
            "compute[0].platform.vsphere.dataDisk",
        ] {
            assert_eq!(keypath::get(&doc, absent).unwrap(), None);
        }
    }

    #[test]
    fn compact_zeroes_compute_replicas_and_skips_worker_sizing() {
        let config = test_config(ClusterMode::Compact, 0);
        let doc = project(&template(), &config, SchemaMode::Flat).unwrap();
        assert_eq!(get_u64(&doc, "compute[0].replicas"), 0);
        assert_eq!(
            keypath::get(&doc, "compute[0].platform.vsphere.cpus").unwrap(),
            None
        );
    }

    #[test]
    fn secrets_are_verbatim_and_last() {
        let config = test_config(ClusterMode::Standard, 3);
        let doc = project(&template(), &config, SchemaMode::Flat).unwrap();
        assert_eq!(
            get_str(&doc, "pullSecret"),
            config.secrets.as_ref().unwrap().pull_secret
        );
        assert_eq!(
            get_str(&doc, "sshKey"),
            config.secrets.as_ref().unwrap().ssh_public_key
        );
    }

    #[test]
    fn rerun_is_idempotent_and_backs_up_once() {
        let config = test_config(ClusterMode::Standard, 3);
        let dest_dir = std::env::temp_dir().join(format!(
            "install-config-idem-{}",
            std::process::id()
        ));
        std::fs::remove_dir_all(&dest_dir).ok();

        let doc = project(&template(), &config, SchemaMode::Flat).unwrap();
        let first = write_document(&doc, &dest_dir).unwrap();
        let first_bytes = std::fs::read(&first).unwrap();

        let doc = project(&template(), &config, SchemaMode::Flat).unwrap();
        let second = write_document(&doc, &dest_dir).unwrap();
        let second_bytes = std::fs::read(&second).unwrap();

        assert_eq!(first_bytes, second_bytes);
        let backups = std::fs::read_dir(&dest_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .count();
        assert_eq!(backups, 1);

        std::fs::remove_dir_all(&dest_dir).ok();
    }

    #[test]
    fn missing_template_is_a_prerequisite_error() {
        let err = load_template(Path::new("definitely/not/here.yaml")).unwrap_err();
        let deploy = err.downcast_ref::<DeployError>().unwrap();
        assert!(matches!(deploy, DeployError::PrerequisiteMissing { .. }));
    }

    #[test]
    fn endpoint_host_extraction() {
        assert_eq!(endpoint_host("https://vc.lab.local/sdk"), "vc.lab.local");
        assert_eq!(endpoint_host("https://10.0.0.10"), "10.0.0.10");
        assert_eq!(endpoint_host("vc.lab.local"), "vc.lab.local");
    }
}
