//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

const REDACTED: &str = "********";

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = global.config.clone().unwrap_or_else(tcc_config::config_path);
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Show => {
            let mut config = super::load(global)?;
            if config.credentials.password.is_some() {
                config.credentials.password = Some(REDACTED.into());
            }
            let rendered = toml::to_string_pretty(&config).map_err(|e| CliError::Internal {
                message: format!("failed to render config: {e}"),
            })?;
            print!("{rendered}");
            Ok(())
        }
    }
}
