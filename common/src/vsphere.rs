use std::path::Path;

use anyhow::Result;

/// A VM shell to create: powered off, OS disk only, wired to the resolved
/// inventory paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmCreateRequest {
    pub name: String,
    pub cpus: u32,
    pub ram_mb: u32,
    pub os_disk_gb: u32,
    pub network_path: String,
    pub resource_pool_path: String,
    pub folder_path: String,
    pub datastore: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
    Unknown,
}

/// Advisory network identity readings; either field may still be unassigned
/// shortly after power-on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub mac: Option<String>,
    pub ip: Option<String>,
}

/// The virtualization control plane as an opaque capability. Implementations
/// receive connection settings explicitly at construction; nothing reads
/// ambient process state.
#[async_trait::async_trait]
pub trait ControlPlane {
    /// Idempotent presence check for the backing CLI tooling.
    async fn ensure_tooling(&self) -> Result<()>;
    /// Upload a local file to a datastore-relative path.
    async fn upload(&self, local: &Path, datastore: &str, remote_path: &str) -> Result<()>;
    async fn create_vm(&self, req: &VmCreateRequest) -> Result<()>;
    /// Forced power-off; an already-off VM is not an error.
    async fn power_off(&self, vm: &str) -> Result<()>;
    async fn power_on(&self, vm: &str) -> Result<()>;
    async fn power_state(&self, vm: &str) -> Result<PowerState>;
    async fn attach_data_disk(&self, vm: &str, size_gb: u32, datastore: &str) -> Result<()>;
    async fn set_extra_config(&self, vm: &str, key: &str, value: &str) -> Result<()>;
    /// Adds an empty removable boot-media device and returns its device id.
    async fn add_boot_media(&self, vm: &str) -> Result<String>;
    async fn insert_boot_media(
        &self,
        vm: &str,
        device: &str,
        datastore: &str,
        image_path: &str,
    ) -> Result<()>;
    /// Marks the device to connect at power-on.
    async fn connect_boot_media(&self, vm: &str, device: &str) -> Result<()>;
    /// Full inventory paths of the VMs under a folder.
    async fn list_vms(&self, folder_path: &str) -> Result<Vec<String>>;
    async fn vm_network_identity(&self, vm: &str) -> Result<NetworkIdentity>;
    async fn destroy_vm(&self, vm: &str) -> Result<()>;
    fn name(&self) -> String;
}
