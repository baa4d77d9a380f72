use anyhow::Result;

use common::config::{parse_answers, DeploymentConfig, SessionConfig};
use common::inventory::RawInventoryNames;

use crate::args::Cli;
use crate::prompts::{self, Flow};

pub mod destroy;
pub mod install_config;
pub mod ls;
pub mod provision;

/// Replay the answers file when one was given, otherwise capture
/// interactively.
pub(crate) fn load_config(cli: &Cli, flow: Flow) -> Result<DeploymentConfig> {
    match &cli.file {
        Some(file) => parse_answers(file),
        None => prompts::capture(flow),
    }
}

/// Connection and inventory only, for the non-provisioning subcommands.
pub(crate) fn access_config(cli: &Cli) -> Result<(SessionConfig, RawInventoryNames)> {
    match &cli.file {
        Some(file) => {
            let config = parse_answers(file)?;
            Ok((config.session, config.inventory))
        }
        None => prompts::capture_access(),
    }
}
