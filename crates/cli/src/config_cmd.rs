//! `shiprecon config`: where the config lives and whether it is usable.

use std::path::PathBuf;

use clap::Subcommand;
use shiprecon_config::{resolve_credentials, Settings, SourceKind};

use crate::util::config_path;
use crate::CliError;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the config file path in use
    Path,

    /// Parse and validate the config file, then list its groups
    #[command(after_help = "\
Examples:
  shiprecon config validate
  shiprecon --config ./shiprecon.toml config validate")]
    Validate,

    /// Write a commented starter config (never overwrites)
    Init,
}

pub fn cmd_config(config: Option<PathBuf>, command: ConfigCommands) -> Result<(), CliError> {
    let path = config_path(config);
    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Validate => cmd_validate(path),
        ConfigCommands::Init => {
            if Settings::write_template(&path)? {
                eprintln!("wrote {}", path.display());
            } else {
                eprintln!("{} already exists, left unchanged", path.display());
            }
            Ok(())
        }
    }
}

fn cmd_validate(path: PathBuf) -> Result<(), CliError> {
    let settings = Settings::load(&path)?;
    settings.validate()?;

    println!("{}: ok", path.display());
    for (id, group) in &settings.groups {
        let detail = match group.kind {
            SourceKind::PaymentSheet => group
                .file
                .as_ref()
                .map(|f| f.display().to_string())
                .unwrap_or_default(),
            SourceKind::Portal | SourceKind::TrackingApi => {
                // reported, not fatal
                match resolve_credentials(id, group) {
                    Ok(creds) => format!("password from {}", creds.source.as_str()),
                    Err(e) => format!("warning: {}", e),
                }
            }
        };
        println!("  {} ({}) {}", id, group.kind.as_str(), detail);
    }
    Ok(())
}
