//! `toonly config`: inspect the configuration without touching the network.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::load_config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(toonly_config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
        }
        ConfigCommand::Show => {
            let cfg = load_config(global)?;
            output::print_output(&cfg.to_redacted_toml()?, global.quiet);
        }
    }
    Ok(())
}
