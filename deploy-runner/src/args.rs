use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "deploy-runner")]
#[command(author, version, about = "Prepares virtualization infrastructure and installer configuration for clustered platform deployments", long_about = None)]
pub struct Cli {
    /// Verbose logging
    #[arg(long, short, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Answers file replaying a previously captured configuration
    #[arg(long, short)]
    pub file: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render the installer configuration document
    InstallConfig(InstallConfigArgs),
    /// Create and boot the cluster VMs
    Provision(ProvisionArgs),
    /// Tear down the VMs under the cluster folder
    Destroy,
    /// List cluster VMs and their network identity
    Ls,
}

#[derive(Debug, Args)]
pub struct InstallConfigArgs {
    /// Target configuration schema: flat or failure-domains
    #[arg(long, default_value = "flat")]
    pub schema: String,

    /// Directory for generated artifacts
    #[arg(long, default_value = "clusters")]
    pub output_dir: String,

    /// Write secrets into the state dump (redacted by default)
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_secrets: bool,
}

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Local path of the boot image to upload
    #[arg(long, default_value = "boot.iso")]
    pub image: String,

    /// Keep provisioning the remaining nodes when one fails
    #[arg(long, action = ArgAction::SetTrue)]
    pub best_effort: bool,

    /// Directory for generated artifacts
    #[arg(long, default_value = "clusters")]
    pub output_dir: String,

    /// Write secrets into the state dump (redacted by default)
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_secrets: bool,
}
