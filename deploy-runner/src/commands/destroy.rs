use anyhow::Result;
use colored::Colorize;

use common::command::GREEN_TICK;
use common::inventory::InventoryPath;
use common::vsphere::ControlPlane;

use govc::Govc;

use crate::args::Cli;
use crate::prompts;

pub async fn run(cli: &Cli) -> Result<()> {
    let (session, inventory) = super::access_config(cli)?;
    let paths = InventoryPath::derive(&inventory);

    let api = Govc::new(session, cli.verbose);
    api.ensure_tooling().await?;

    let vms = api.list_vms(&paths.folder_path).await?;
    if vms.is_empty() {
        println!("Nothing to destroy under {}", paths.folder_path);
        return Ok(());
    }

    for vm in &vms {
        println!("  {vm}");
    }
    if !prompts::proceed_gate(&format!("Destroy these {} VMs?", vms.len()))? {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    for vm in &vms {
        api.power_off(vm).await?;
        api.destroy_vm(vm).await?;
        println!("{} destroyed {vm}", GREEN_TICK.to_string());
    }
    Ok(())
}
