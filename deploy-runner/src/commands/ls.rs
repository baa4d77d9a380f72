use anyhow::Result;

use common::inventory::InventoryPath;
use common::vsphere::ControlPlane;

use govc::Govc;

use crate::args::Cli;
use crate::summary;

pub async fn run(cli: &Cli) -> Result<()> {
    let (session, inventory) = super::access_config(cli)?;
    let paths = InventoryPath::derive(&inventory);

    let api = Govc::new(session, cli.verbose);
    api.ensure_tooling().await?;

    let vms = api.list_vms(&paths.folder_path).await?;
    if vms.is_empty() {
        println!("No VMs under {}", paths.folder_path);
        return Ok(());
    }

    for vm in &vms {
        let leaf = vm.rsplit('/').next().unwrap_or(vm);
        // Advisory readings; freshly booted VMs legitimately show pending.
        let identity = api.vm_network_identity(leaf).await.unwrap_or_default();
        summary::print_kv(
            leaf,
            &format!(
                "mac={} ip={}",
                identity.mac.as_deref().unwrap_or("pending"),
                identity.ip.as_deref().unwrap_or("pending")
            ),
        );
    }
    Ok(())
}
