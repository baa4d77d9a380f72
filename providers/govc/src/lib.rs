use std::{collections::HashMap, path::Path, process::Stdio};

use anyhow::Result;
use common::{
    command::{run, run_captured},
    config::SessionConfig,
    error::DeployError,
    vsphere::{ControlPlane, NetworkIdentity, PowerState, VmCreateRequest},
};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

const UPLOAD: [&str; 3] = [
    "Uploading boot image",
    "Could not upload boot image",
    "Boot image uploaded",
];

/// `vm.info -json` payload. Field names went from Go-style to camelCase
/// across govc releases; aliases accept both.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    #[serde(default, rename = "virtualMachines", alias = "VirtualMachines")]
    pub virtual_machines: Vec<VirtualMachine>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    #[serde(default, rename = "runtime", alias = "Runtime")]
    pub runtime: Runtime,
    #[serde(default, rename = "guest", alias = "Guest")]
    pub guest: Option<Guest>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runtime {
    #[serde(default, rename = "powerState", alias = "PowerState")]
    pub power_state: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    #[serde(default, rename = "ipAddress", alias = "IpAddress")]
    pub ip_address: Option<String>,
}

/// Control-plane implementation over the govc CLI. The session is held by
/// value and turned into a child-process environment per invocation; nothing
/// is exported into our own environment.
pub struct Govc {
    session: SessionConfig,
    verbose: bool,
}

impl Govc {
    pub fn new(session: SessionConfig, verbose: bool) -> Self {
        Self { session, verbose }
    }

    fn env(&self) -> HashMap<String, String> {
        HashMap::from([
            ("GOVC_URL".to_owned(), self.session.endpoint_url.clone()),
            ("GOVC_USERNAME".to_owned(), self.session.username.clone()),
            ("GOVC_PASSWORD".to_owned(), self.session.password.clone()),
            (
                "GOVC_INSECURE".to_owned(),
                if self.session.allow_insecure_tls {
                    "1".to_owned()
                } else {
                    "0".to_owned()
                },
            ),
        ])
    }

    async fn govc(&self, args: &[&str]) -> Result<String> {
        run_captured("govc", args, &self.env()).await
    }
}

#[async_trait::async_trait]
impl ControlPlane for Govc {
    async fn ensure_tooling(&self) -> Result<()> {
        let probe = Command::new("govc")
            .arg("version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;
        match probe {
            Ok(output) if output.status.success() => {
                tracing::debug!(
                    "{}",
                    String::from_utf8_lossy(&output.stdout).trim()
                );
                Ok(())
            }
            _ => Err(DeployError::PrerequisiteMissing {
                what: "the govc CLI".to_owned(),
                remedy: "Install govc from https://github.com/vmware/govmomi/releases \
                         and put it on PATH, then re-run."
                    .to_owned(),
            }
            .into()),
        }
    }

    async fn upload(&self, local: &Path, datastore: &str, remote_path: &str) -> Result<()> {
        let local = local.to_string_lossy();
        run(
            "govc",
            &[
                "datastore.upload",
                "-ds",
                datastore,
                local.as_ref(),
                remote_path,
            ],
            self.verbose,
            UPLOAD,
            &self.env(),
        )
        .await
    }

    async fn create_vm(&self, req: &VmCreateRequest) -> Result<()> {
        let cpus = format!("-c={}", req.cpus);
        let ram = format!("-m={}", req.ram_mb);
        let disk = format!("-disk={}GB", req.os_disk_gb);
        let net = format!("-net={}", req.network_path);
        let pool = format!("-pool={}", req.resource_pool_path);
        let folder = format!("-folder={}", req.folder_path);
        let ds = format!("-ds={}", req.datastore);
        self.govc(&[
            "vm.create", &cpus, &ram, &disk, &net, &pool, &folder, &ds, "-on=false", &req.name,
        ])
        .await?;
        Ok(())
    }

    async fn power_off(&self, vm: &str) -> Result<()> {
        // Fails when the VM is already off; that outcome is fine here.
        let output = Command::new("govc")
            .args(["vm.power", "-off", "-force", vm])
            .envs(&self.env())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !output.status.success() {
            tracing::debug!(
                "power off {vm}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    async fn power_on(&self, vm: &str) -> Result<()> {
        self.govc(&["vm.power", "-on", vm]).await?;
        Ok(())
    }

    async fn power_state(&self, vm: &str) -> Result<PowerState> {
        let json = self.govc(&["vm.info", "-json", vm]).await?;
        let info: Root = serde_json::from_str(&json)?;
        let state = info
            .virtual_machines
            .first()
            .map(|m| m.runtime.power_state.as_str())
            .unwrap_or_default();
        Ok(match state {
            "poweredOn" => PowerState::PoweredOn,
            "poweredOff" => PowerState::PoweredOff,
            "suspended" => PowerState::Suspended,
            _ => PowerState::Unknown,
        })
    }

    async fn attach_data_disk(&self, vm: &str, size_gb: u32, datastore: &str) -> Result<()> {
        let disk_name = format!("-name={vm}/data");
        let size = format!("-size={size_gb}G");
        self.govc(&[
            "vm.disk.create",
            "-vm",
            vm,
            &disk_name,
            &size,
            "-ds",
            datastore,
        ])
        .await?;
        Ok(())
    }

    async fn set_extra_config(&self, vm: &str, key: &str, value: &str) -> Result<()> {
        let pair = format!("{key}={value}");
        self.govc(&["vm.change", "-vm", vm, "-e", &pair]).await?;
        Ok(())
    }

    async fn add_boot_media(&self, vm: &str) -> Result<String> {
        let device = self.govc(&["device.cdrom.add", "-vm", vm]).await?;
        Ok(device.trim().to_owned())
    }

    async fn insert_boot_media(
        &self,
        vm: &str,
        device: &str,
        datastore: &str,
        image_path: &str,
    ) -> Result<()> {
        self.govc(&[
            "device.cdrom.insert",
            "-vm",
            vm,
            "-device",
            device,
            "-ds",
            datastore,
            image_path,
        ])
        .await?;
        Ok(())
    }

    async fn connect_boot_media(&self, vm: &str, device: &str) -> Result<()> {
        self.govc(&["device.connect", "-vm", vm, device]).await?;
        Ok(())
    }

    async fn list_vms(&self, folder_path: &str) -> Result<Vec<String>> {
        let listing = self.govc(&["find", folder_path, "-type", "m"]).await?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect())
    }

    async fn vm_network_identity(&self, vm: &str) -> Result<NetworkIdentity> {
        let json = self.govc(&["vm.info", "-json", vm]).await?;
        let info: Root = serde_json::from_str(&json)?;
        let ip = info
            .virtual_machines
            .first()
            .and_then(|m| m.guest.as_ref())
            .and_then(|g| g.ip_address.clone())
            .filter(|ip| !ip.is_empty());

        // device.info prints a text table; the MAC line survives format drift
        // better than the devices JSON does.
        let devices = self
            .govc(&["device.info", "-vm", vm, "ethernet-*"])
            .await
            .unwrap_or_default();
        let mac = devices
            .lines()
            .find_map(|line| line.split_once("MAC Address:"))
            .map(|(_, mac)| mac.trim().to_owned())
            .filter(|mac| !mac.is_empty());

        Ok(NetworkIdentity { mac, ip })
    }

    async fn destroy_vm(&self, vm: &str) -> Result<()> {
        self.govc(&["vm.destroy", vm]).await?;
        Ok(())
    }

    fn name(&self) -> String {
        "govc".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_info_accepts_both_field_casings() {
        let camel = r#"{"virtualMachines":[{"runtime":{"powerState":"poweredOn"},"guest":{"ipAddress":"10.0.0.21"}}]}"#;
        let info: Root = serde_json::from_str(camel).unwrap();
        assert_eq!(info.virtual_machines[0].runtime.power_state, "poweredOn");
        assert_eq!(
            info.virtual_machines[0]
                .guest
                .as_ref()
                .unwrap()
                .ip_address
                .as_deref(),
            Some("10.0.0.21")
        );

        let pascal = r#"{"VirtualMachines":[{"Runtime":{"PowerState":"poweredOff"},"Guest":null}]}"#;
        let info: Root = serde_json::from_str(pascal).unwrap();
        assert_eq!(info.virtual_machines[0].runtime.power_state, "poweredOff");
        assert!(info.virtual_machines[0].guest.is_none());
    }

    #[test]
    fn session_env_is_explicit() {
        let govc = Govc::new(
            SessionConfig {
                endpoint_url: "https://vc.lab.local/sdk".into(),
                username: "administrator@vsphere.local".into(),
                password: "hunter2".into(),
                allow_insecure_tls: true,
            },
            false,
        );
        let env = govc.env();
        assert_eq!(env["GOVC_URL"], "https://vc.lab.local/sdk");
        assert_eq!(env["GOVC_INSECURE"], "1");
        // The credentials only ever live in the per-invocation map.
        assert!(std::env::var("GOVC_PASSWORD").is_err());
    }
}
