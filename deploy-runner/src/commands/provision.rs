use std::{
    collections::BTreeMap,
    future::Future,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Result;
use colored::Colorize;

use common::command::GREEN_TICK;
use common::error::DeployError;
use common::inventory::InventoryPath;
use common::topology::{self, NodeSpec};
use common::vsphere::{ControlPlane, PowerState, VmCreateRequest};
use common::wait::{self, WaitOpts};

use crate::args::{Cli, ProvisionArgs};
use crate::prompts::{self, Flow};
use crate::summary;

use govc::Govc;

/// Per-node provisioning steps, in their load-bearing order: the disk UUID
/// flag must be set before power-on, and boot media must be inserted before
/// it is marked to connect at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateVm,
    PowerOffGuard,
    AttachDataDisk,
    EnableDiskUuid,
    AddBootMedia,
    InsertBootMedia,
    ConnectBootMedia,
    PowerOn,
}

impl Step {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::CreateVm => "create VM shell",
            Self::PowerOffGuard => "defensive power-off",
            Self::AttachDataDisk => "attach data disk",
            Self::EnableDiskUuid => "enable disk UUID",
            Self::AddBootMedia => "add boot media device",
            Self::InsertBootMedia => "insert boot image",
            Self::ConnectBootMedia => "connect boot media at power-on",
            Self::PowerOn => "power on",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Planned,
    Created,
    DiskConfigured,
    BootConfigured,
    PoweredOn,
    Failed(Step),
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::Created => write!(f, "created"),
            Self::DiskConfigured => write!(f, "disk configured"),
            Self::BootConfigured => write!(f, "boot configured"),
            Self::PoweredOn => write!(f, "powered on"),
            Self::Failed(step) => write!(f, "failed ({})", step.describe()),
        }
    }
}

/// What happens after the first failing node. AbortRun stops the entire run
/// immediately; BestEffort keeps provisioning the remaining nodes and reports
/// every failure at the end. Either way the run exits non-zero on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    AbortRun,
    BestEffort,
}

pub type Progress = Arc<Mutex<BTreeMap<String, NodeState>>>;

pub struct Sequencer<'a, C: ControlPlane + Send + Sync> {
    api: &'a C,
    paths: &'a InventoryPath,
    datastore: String,
    policy: FailurePolicy,
    progress: Progress,
}

impl<'a, C: ControlPlane + Send + Sync> Sequencer<'a, C> {
    pub fn new(
        api: &'a C,
        paths: &'a InventoryPath,
        datastore: String,
        policy: FailurePolicy,
        progress: Progress,
    ) -> Self {
        Self {
            api,
            paths,
            datastore,
            policy,
            progress,
        }
    }

    fn advance(&self, vm: &str, state: NodeState) {
        self.progress
            .lock()
            .unwrap()
            .insert(vm.to_owned(), state);
    }

    async fn run_step<T>(
        &self,
        vm: &str,
        step: Step,
        action: impl Future<Output = Result<T>>,
    ) -> Result<T, DeployError> {
        tracing::info!("{vm}: {}", step.describe());
        match action.await {
            Ok(value) => {
                println!("  {} {} {}", GREEN_TICK.to_string(), vm.bold(), step.describe());
                Ok(value)
            }
            Err(err) => {
                self.advance(vm, NodeState::Failed(step));
                Err(DeployError::Remote {
                    resource: vm.to_owned(),
                    step: step.describe().to_owned(),
                    detail: format!("{err:#}"),
                })
            }
        }
    }

    fn create_request(&self, spec: &NodeSpec) -> VmCreateRequest {
        VmCreateRequest {
            name: spec.name.clone(),
            cpus: spec.cpus,
            ram_mb: spec.ram_gb * 1024,
            os_disk_gb: spec.os_disk_gb,
            network_path: self.paths.network_path.clone(),
            resource_pool_path: self.paths.resource_pool_path.clone(),
            folder_path: self.paths.folder_path.clone(),
            datastore: self.datastore.clone(),
        }
    }

    /// States advance strictly in order; a node only moves on after the
    /// current operation reported success.
    async fn provision_node(&self, spec: &NodeSpec) -> Result<(), DeployError> {
        let vm = spec.name.as_str();
        self.advance(vm, NodeState::Planned);

        let request = self.create_request(spec);
        self.run_step(vm, Step::CreateVm, self.api.create_vm(&request))
            .await?;
        self.advance(vm, NodeState::Created);

        self.run_step(vm, Step::PowerOffGuard, self.api.power_off(vm))
            .await?;

        if let Some(size_gb) = spec.data_disk_gb {
            self.run_step(
                vm,
                Step::AttachDataDisk,
                self.api.attach_data_disk(vm, size_gb, &self.datastore),
            )
            .await?;
        }
        self.run_step(
            vm,
            Step::EnableDiskUuid,
            self.api.set_extra_config(vm, "disk.enableUUID", "TRUE"),
        )
        .await?;
        self.advance(vm, NodeState::DiskConfigured);

        let device = self
            .run_step(vm, Step::AddBootMedia, self.api.add_boot_media(vm))
            .await?;
        self.run_step(
            vm,
            Step::InsertBootMedia,
            self.api
                .insert_boot_media(vm, &device, &self.datastore, &spec.boot_image),
        )
        .await?;
        self.run_step(
            vm,
            Step::ConnectBootMedia,
            self.api.connect_boot_media(vm, &device),
        )
        .await?;
        self.advance(vm, NodeState::BootConfigured);

        self.run_step(vm, Step::PowerOn, self.api.power_on(vm))
            .await?;

        // Bounded readiness poll instead of a fixed sleep after the power
        // state change.
        let api = self.api;
        let readiness = wait::poll_until(
            &format!("{vm} to report powered on"),
            WaitOpts::default(),
            || async move { matches!(api.power_state(vm).await, Ok(PowerState::PoweredOn)) },
        )
        .await;
        if let Err(timeout) = readiness {
            self.advance(vm, NodeState::Failed(Step::PowerOn));
            return Err(timeout);
        }
        self.advance(vm, NodeState::PoweredOn);
        Ok(())
    }

    /// Runs every node through the state machine. Under AbortRun the first
    /// failure stops the run before the next node's first step.
    pub async fn provision(&self, specs: &[NodeSpec]) -> Result<Vec<String>, Vec<DeployError>> {
        let mut powered_on = Vec::new();
        let mut failures = Vec::new();
        for spec in specs {
            match self.provision_node(spec).await {
                Ok(()) => powered_on.push(spec.name.clone()),
                Err(err) => {
                    failures.push(err);
                    match self.policy {
                        FailurePolicy::AbortRun => return Err(failures),
                        FailurePolicy::BestEffort => continue,
                    }
                }
            }
        }
        if failures.is_empty() {
            Ok(powered_on)
        } else {
            Err(failures)
        }
    }
}

pub async fn run(args: &ProvisionArgs, cli: &Cli) -> Result<()> {
    let config = super::load_config(cli, Flow::Provision)?;
    let resolved = topology::resolve(config.mode, Some(config.worker_count));
    let paths = InventoryPath::derive(&config.inventory);

    let image = PathBuf::from(&args.image);
    if !image.exists() {
        return Err(DeployError::PrerequisiteMissing {
            what: format!("boot image {}", image.display()),
            remedy: "Download the release boot image and pass its path with --image.".to_owned(),
        }
        .into());
    }

    let remote_image = format!(
        "{}/boot-{}.iso",
        config.identity.cluster_name, config.identity.release
    );
    let specs = topology::node_specs(
        &resolved,
        config.master_sizing,
        config.worker_sizing,
        &config.identity.cluster_name,
        &remote_image,
    );

    summary::print_plan(&config, &paths, &specs);
    if !prompts::proceed_gate(&format!("Create and boot these {} VMs?", specs.len()))? {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    let progress: Progress = Arc::new(Mutex::new(BTreeMap::new()));
    spawn_interrupt_reporter(progress.clone());

    let api = Govc::new(config.session.clone(), cli.verbose);
    api.ensure_tooling().await?;
    api.upload(Path::new(&args.image), &config.inventory.datastore, &remote_image)
        .await?;

    let policy = if args.best_effort {
        FailurePolicy::BestEffort
    } else {
        FailurePolicy::AbortRun
    };
    let sequencer = Sequencer::new(
        &api,
        &paths,
        config.inventory.datastore.clone(),
        policy,
        progress.clone(),
    );

    let outcome = sequencer.provision(&specs).await;

    // Advisory only: a node that has not picked up an address yet reads as
    // pending and never fails the run.
    let created: Vec<String> = progress
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, state)| {
            !matches!(**state, NodeState::Planned | NodeState::Failed(Step::CreateVm))
        })
        .map(|(name, _)| name.clone())
        .collect();
    if !created.is_empty() {
        summary::print_section("Network identity");
        for vm in &created {
            let identity = api.vm_network_identity(vm).await.unwrap_or_default();
            summary::print_kv(
                vm,
                &format!(
                    "mac={} ip={}",
                    identity.mac.as_deref().unwrap_or("pending"),
                    identity.ip.as_deref().unwrap_or("pending")
                ),
            );
        }
    }

    let dest_dir = PathBuf::from(&args.output_dir).join(&config.identity.cluster_name);
    std::fs::create_dir_all(&dest_dir)?;
    let dump = dest_dir.join("cluster-state.env");
    summary::write_state_dump(&dump, &config, &paths, &specs, args.dump_secrets)?;
    summary::print_success(&format!("Wrote {}", dump.display()));

    match outcome {
        Ok(powered_on) => {
            summary::print_success(&format!("All {} nodes powered on", powered_on.len()));
            Ok(())
        }
        Err(failures) => {
            for failure in &failures {
                println!("{} {failure}", "✗".red().bold());
            }
            anyhow::bail!("{} node(s) failed to provision", failures.len())
        }
    }
}

/// SIGINT/SIGTERM report partial per-node progress before exiting non-zero;
/// never a silent abort.
fn spawn_interrupt_reporter(progress: Progress) {
    tokio::spawn(async move {
        let mut term =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(term) => term,
                Err(_) => return,
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
        eprintln!();
        eprintln!("{}", "Interrupted; partial progress:".red().bold());
        for (node, state) in progress.lock().unwrap().iter() {
            eprintln!("  {node}: {state}");
        }
        std::process::exit(1);
    });
}
