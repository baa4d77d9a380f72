use anyhow::Result;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password, Select};

use common::config::{
    ClusterIdentity, DeploymentConfig, Secrets, SessionConfig, VipAddresses,
};
use common::error::ValidationError;
use common::inventory::{parse_folder_path, RawInventoryNames};
use common::topology::{self, ClusterMode, NodeRole, NodeSizing};
use common::validate;

/// Which inputs a flow needs. The two flows differ in their prompt sets, not
/// in the capture mechanics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Projection: identity, VIPs and secrets; sizing lands in the document.
    InstallConfig,
    /// VM creation: no VIPs or secrets; sizing lands on the VMs.
    Provision,
}

/// Asks until the pure validator accepts. The validator never loops itself;
/// this is the single retry point for recoverable input errors.
fn ask_until<T>(
    theme: &ColorfulTheme,
    prompt: &str,
    default: Option<String>,
    check: impl Fn(&str) -> Result<T, ValidationError>,
) -> Result<T> {
    loop {
        let raw: String = match &default {
            Some(d) => Input::with_theme(theme)
                .with_prompt(prompt)
                .default(d.clone())
                .allow_empty(true)
                .interact_text()?,
            None => Input::with_theme(theme)
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()?,
        };
        match check(&raw) {
            Ok(value) => return Ok(value),
            Err(err) => println!("{}", err.to_string().red()),
        }
    }
}

fn capture_session(theme: &ColorfulTheme) -> Result<SessionConfig> {
    let endpoint_url = ask_until(
        theme,
        "Control-plane endpoint URL",
        None,
        validate::url_shape,
    )?;
    let username = ask_until(theme, "Username", None, validate::non_empty)?;
    let password = loop {
        let raw = Password::with_theme(theme).with_prompt("Password").interact()?;
        match validate::non_empty(&raw) {
            Ok(p) => break p,
            Err(err) => println!("{}", err.to_string().red()),
        }
    };
    let allow_insecure_tls = ask_until(
        theme,
        "Allow insecure TLS (self-signed certificate)? [y/n]",
        Some("n".to_owned()),
        validate::yes_no,
    )?;

    Ok(SessionConfig {
        endpoint_url,
        username,
        password,
        allow_insecure_tls,
    })
}

fn capture_inventory(theme: &ColorfulTheme) -> Result<RawInventoryNames> {
    let datacenter = ask_until(theme, "Datacenter name", None, validate::non_empty)?;
    let cluster = ask_until(theme, "Compute cluster name", None, validate::non_empty)?;

    // Either a bare folder name or a full /<datacenter>/vm/... path; the
    // strict parser rejects anything in between.
    let expected_dc = datacenter.clone();
    let folder = ask_until(
        theme,
        "VM folder (name or full /<datacenter>/vm/... path)",
        None,
        move |raw| {
            let trimmed = validate::non_empty(raw)?;
            if !trimmed.starts_with('/') {
                return Ok(trimmed);
            }
            let (dc, leaf) = parse_folder_path(&trimmed)?;
            if dc != expected_dc {
                return Err(ValidationError::InvalidPath(trimmed));
            }
            Ok(leaf)
        },
    )?;

    let datastore = ask_until(theme, "Datastore name", None, validate::non_empty)?;
    let network = ask_until(theme, "Network name", None, validate::non_empty)?;

    Ok(RawInventoryNames {
        datacenter,
        cluster,
        folder,
        datastore,
        network,
    })
}

fn capture_mode(theme: &ColorfulTheme) -> Result<ClusterMode> {
    let items = [
        "Compact - 3 nodes, control plane doubles as workers",
        "Standard - 3 control-plane nodes plus dedicated workers",
    ];
    let selection = Select::with_theme(theme)
        .with_prompt("Cluster mode")
        .default(0)
        .items(&items)
        .interact()?;
    Ok(ClusterMode::from_selector(selection as u32 + 1)?)
}

/// Accept the defaults, or override every field and confirm the bundle. A
/// rejected confirmation restarts the whole role capture; partial edits are
/// never merged.
fn capture_sizing(theme: &ColorfulTheme, mode: ClusterMode, role: NodeRole) -> Result<NodeSizing> {
    let defaults = topology::default_sizing(mode, role);
    let ranges = topology::sizing_ranges(mode, role);
    loop {
        let accept = Confirm::with_theme(theme)
            .with_prompt(format!(
                "Accept default {} sizing ({} vCPU, {} GB RAM, {} GB disk)?",
                role.as_str(),
                defaults.cpus,
                defaults.ram_gb,
                defaults.disk_gb
            ))
            .default(true)
            .interact()?;
        if accept {
            println!(
                "{}",
                format!(
                    "Using {} vCPU, {} GB RAM, {} GB disk for {} nodes",
                    defaults.cpus,
                    defaults.ram_gb,
                    defaults.disk_gb,
                    role.as_str()
                )
                .dimmed()
            );
            return Ok(defaults);
        }

        let cpus = ask_until(
            theme,
            &format!("{} vCPUs [{}-{}]", role.as_str(), ranges.cpus.min, ranges.cpus.max),
            None,
            |raw| validate::int_in_range(raw, ranges.cpus.min, ranges.cpus.max),
        )?;
        let ram_gb = ask_until(
            theme,
            &format!(
                "{} RAM in GB [{}-{}]",
                role.as_str(),
                ranges.ram_gb.min,
                ranges.ram_gb.max
            ),
            None,
            |raw| validate::int_in_range(raw, ranges.ram_gb.min, ranges.ram_gb.max),
        )?;
        let disk_gb = ask_until(
            theme,
            &format!(
                "{} disk in GB [{}-{}]",
                role.as_str(),
                ranges.disk_gb.min,
                ranges.disk_gb.max
            ),
            None,
            |raw| validate::int_in_range(raw, ranges.disk_gb.min, ranges.disk_gb.max),
        )?;

        let confirmed = Confirm::with_theme(theme)
            .with_prompt(format!(
                "Apply {} sizing: {cpus} vCPU, {ram_gb} GB RAM, {disk_gb} GB disk?",
                role.as_str()
            ))
            .default(false)
            .interact()?;
        if confirmed {
            return Ok(NodeSizing {
                cpus,
                ram_gb,
                disk_gb,
            });
        }
    }
}

fn capture_secrets(theme: &ColorfulTheme) -> Result<Secrets> {
    println!(
        "Paste the registry pull secret, then finish with a line containing only {}:",
        "EOF".bold()
    );
    let pull_secret = loop {
        let mut lines = Vec::new();
        for line in std::io::stdin().lines() {
            let line = line?;
            if line.trim() == "EOF" {
                break;
            }
            lines.push(line);
        }
        // Stored verbatim; only emptiness is checked.
        let raw = lines.join("\n");
        if validate::non_empty(&raw).is_ok() {
            break raw;
        }
        println!("{}", "the pull secret must not be empty".red());
    };

    let ssh_public_key = ask_until(theme, "SSH public key", None, validate::ssh_public_key)?;

    Ok(Secrets {
        pull_secret,
        ssh_public_key,
    })
}

pub fn capture(flow: Flow) -> Result<DeploymentConfig> {
    let theme = ColorfulTheme::default();

    println!();
    println!("{}", "Control-plane connection".cyan().bold());
    let session = capture_session(&theme)?;

    println!();
    println!("{}", "Inventory".cyan().bold());
    let inventory = capture_inventory(&theme)?;

    println!();
    println!("{}", "Cluster".cyan().bold());
    let cluster_name = ask_until(&theme, "Cluster name", None, validate::non_empty)?;
    let base_domain = match flow {
        Flow::InstallConfig => Some(ask_until(
            &theme,
            "Base DNS domain",
            None,
            validate::non_empty,
        )?),
        Flow::Provision => None,
    };
    let release = ask_until(&theme, "Release identifier", None, validate::non_empty)?;

    let mode = capture_mode(&theme)?;
    let worker_count = match mode {
        ClusterMode::Compact => 0,
        ClusterMode::Standard => ask_until(
            &theme,
            &format!(
                "Worker node count [{}-{}]",
                topology::WORKER_COUNT_MIN,
                topology::WORKER_COUNT_MAX
            ),
            Some(topology::DEFAULT_WORKER_COUNT.to_string()),
            |raw| {
                validate::int_in_range(
                    raw,
                    topology::WORKER_COUNT_MIN,
                    topology::WORKER_COUNT_MAX,
                )
            },
        )?,
    };

    println!();
    println!("{}", "Node sizing".cyan().bold());
    let master_sizing = capture_sizing(&theme, mode, NodeRole::Master)?;
    let worker_sizing = match mode {
        ClusterMode::Compact => NodeSizing::default(),
        ClusterMode::Standard => capture_sizing(&theme, mode, NodeRole::Worker)?,
    };

    let vips = match flow {
        Flow::InstallConfig => {
            println!();
            println!("{}", "Virtual IPs".cyan().bold());
            Some(VipAddresses {
                api: ask_until(&theme, "API VIP", None, validate::non_empty)?,
                ingress: ask_until(&theme, "Ingress VIP", None, validate::non_empty)?,
            })
        }
        Flow::Provision => None,
    };

    let secrets = match flow {
        Flow::InstallConfig => {
            println!();
            println!("{}", "Secrets".cyan().bold());
            Some(capture_secrets(&theme)?)
        }
        Flow::Provision => None,
    };

    Ok(DeploymentConfig {
        mode,
        worker_count,
        session,
        identity: ClusterIdentity {
            cluster_name,
            base_domain,
            release,
        },
        inventory,
        master_sizing,
        worker_sizing,
        vips,
        secrets,
    })
}

/// Connection and inventory only; enough for `destroy` and `ls`.
pub fn capture_access() -> Result<(SessionConfig, RawInventoryNames)> {
    let theme = ColorfulTheme::default();

    println!();
    println!("{}", "Control-plane connection".cyan().bold());
    let session = capture_session(&theme)?;

    println!();
    println!("{}", "Inventory".cyan().bold());
    let inventory = capture_inventory(&theme)?;

    Ok((session, inventory))
}

/// The single confirmation gate in front of any mutating action.
pub fn proceed_gate(prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
