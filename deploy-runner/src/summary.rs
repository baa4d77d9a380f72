use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use common::config::DeploymentConfig;
use common::inventory::InventoryPath;
use common::topology::NodeSpec;

const REDACTED: &str = "<redacted>";

pub fn print_section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

pub fn print_success(message: &str) {
    println!("{} {}", "✔".green().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message.yellow());
}

pub fn print_kv(key: &str, value: &str) {
    println!("  {} {}", format!("{key}:").dimmed(), value);
}

/// The plan shown to the operator before the proceed gate.
pub fn print_plan(config: &DeploymentConfig, paths: &InventoryPath, specs: &[NodeSpec]) {
    print_section("Deployment plan");
    print_kv("cluster", &config.identity.cluster_name);
    print_kv("release", &config.identity.release);
    print_kv("mode", &config.mode.to_string());
    print_kv("endpoint", &config.session.endpoint_url);
    print_kv("folder", &paths.folder_path);
    print_kv("resource pool", &paths.resource_pool_path);
    print_kv("datastore", &paths.datastore_path);
    print_kv("network", &paths.network_path);
    for spec in specs {
        let disks = match spec.data_disk_gb {
            Some(data) => format!("{} GB os + {data} GB data", spec.os_disk_gb),
            None => format!("{} GB os", spec.os_disk_gb),
        };
        print_kv(
            &spec.name,
            &format!("{} vCPU, {} GB RAM, {disks}", spec.cpus, spec.ram_gb),
        );
    }
}

/// Flat key=value dump for operator reference. Secrets stay redacted unless
/// the operator explicitly opted in.
pub fn write_state_dump(
    path: &Path,
    config: &DeploymentConfig,
    paths: &InventoryPath,
    specs: &[NodeSpec],
    dump_secrets: bool,
) -> Result<()> {
    let mut lines = vec![
        format!("cluster_name={}", config.identity.cluster_name),
        format!(
            "base_domain={}",
            config.identity.base_domain.as_deref().unwrap_or("")
        ),
        format!("release={}", config.identity.release),
        format!("mode={}", config.mode),
        format!("worker_count={}", config.worker_count),
        format!("endpoint_url={}", config.session.endpoint_url),
        format!("username={}", config.session.username),
        format!(
            "password={}",
            if dump_secrets {
                config.session.password.as_str()
            } else {
                REDACTED
            }
        ),
        format!("allow_insecure_tls={}", config.session.allow_insecure_tls),
        format!("datacenter_path={}", paths.datacenter_path),
        format!("cluster_path={}", paths.cluster_path),
        format!("resource_pool_path={}", paths.resource_pool_path),
        format!("folder_path={}", paths.folder_path),
        format!("datastore_path={}", paths.datastore_path),
        format!("network_path={}", paths.network_path),
        format!("master_cpus={}", config.master_sizing.cpus),
        format!("master_ram_gb={}", config.master_sizing.ram_gb),
        format!("master_disk_gb={}", config.master_sizing.disk_gb),
        format!("worker_cpus={}", config.worker_sizing.cpus),
        format!("worker_ram_gb={}", config.worker_sizing.ram_gb),
        format!("worker_disk_gb={}", config.worker_sizing.disk_gb),
    ];

    if let Some(vips) = &config.vips {
        lines.push(format!("api_vip={}", vips.api));
        lines.push(format!("ingress_vip={}", vips.ingress));
    }

    if let Some(secrets) = &config.secrets {
        if dump_secrets {
            lines.push(format!(
                "pull_secret={}",
                secrets.pull_secret.replace('\n', "\\n")
            ));
            lines.push(format!("ssh_public_key={}", secrets.ssh_public_key));
        } else {
            lines.push(format!("pull_secret={REDACTED}"));
            lines.push(format!("ssh_public_key={REDACTED}"));
        }
    }

    for (i, spec) in specs.iter().enumerate() {
        let n = i + 1;
        lines.push(format!("node.{n}.name={}", spec.name));
        lines.push(format!("node.{n}.role={}", spec.role.as_str()));
        lines.push(format!("node.{n}.cpus={}", spec.cpus));
        lines.push(format!("node.{n}.ram_gb={}", spec.ram_gb));
        lines.push(format!("node.{n}.os_disk_gb={}", spec.os_disk_gb));
        if let Some(data) = spec.data_disk_gb {
            lines.push(format!("node.{n}.data_disk_gb={data}"));
        }
    }

    if dump_secrets {
        print_warning("state dump contains cleartext secrets; protect the file");
    }

    std::fs::write(path, lines.join("\n") + "\n")?;
    Ok(())
}
