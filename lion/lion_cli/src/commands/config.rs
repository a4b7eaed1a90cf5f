//! Print the effective configuration.

use crate::config::CliConfig;
use clap::Args;

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {}

/// Print the configuration, after file values are applied, as TOML
pub fn execute(_args: &ConfigArgs, config: &CliConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
