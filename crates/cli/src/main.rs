// shiprecon CLI - reconcile shipment trackings against reimbursed costs

mod config_cmd;
mod digest;
mod exit_codes;
mod export;
mod fetch;
mod reconcile;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use shiprecon_config::settings::CONFIG_ENV;
use shiprecon_config::ConfigError;
use shiprecon_io::StoreError;
use shiprecon_sources::FetchError;
use tracing_subscriber::EnvFilter;

use exit_codes::{
    config_exit_code, fetch_exit_code, store_exit_code, EXIT_IO, EXIT_SUCCESS,
    EXIT_USAGE,
};

const LOG_ENV: &str = "SHIPRECON_LOG";
const LOG_FORMAT_ENV: &str = "SHIPRECON_LOG_FORMAT";

#[derive(Parser)]
#[command(name = "shiprecon")]
#[command(about = "Cluster shipment trackings and reconcile them against reimbursed costs")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: $SHIPRECON_CONFIG, else the user config dir)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by SHIPRECON_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest trackings, fetch costs, merge and save the cluster store
    #[command(after_help = "\
Examples:
  shiprecon reconcile --trackings trackings.csv
  shiprecon reconcile --trackings trackings.csv --orders orders.csv --out clusters.csv
  shiprecon reconcile --trackings trackings.csv --group mysite --group usa --full
  shiprecon reconcile --trackings trackings.csv --skip-fetch")]
    Reconcile {
        /// Tracking export (CSV with a 'Tracking Number' column)
        #[arg(long)]
        trackings: PathBuf,

        /// Billed amounts per order (CSV: Order Number, Amount)
        #[arg(long)]
        orders: Option<PathBuf>,

        /// Only fetch these groups (repeatable; default: every configured group)
        #[arg(long = "group", value_name = "GROUP")]
        groups: Vec<String>,

        /// Rescan old records instead of stopping at the first stale one
        #[arg(long)]
        full: bool,

        /// Reuse ledger costs without contacting any source
        #[arg(long)]
        skip_fetch: bool,

        /// Also write the clusters as CSV
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Fetch one group's costs and print them as CSV
    #[command(after_help = "\
Examples:
  shiprecon fetch mysite
  shiprecon fetch usa --full --out usa-costs.csv")]
    Fetch {
        /// Group id from the config
        group: String,

        /// Rescan old records instead of stopping at the first stale one
        #[arg(long)]
        full: bool,

        /// Output CSV file path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Write the stored clusters as CSV
    Export {
        /// Output CSV file path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Render the new-trackings digest for a tracking export
    #[command(after_help = "\
Examples:
  shiprecon digest --trackings new.csv
  shiprecon digest --trackings new.csv --date 2024-03-01 --out digest.txt
  shiprecon digest --trackings new.csv --csv new-trackings.csv")]
    Digest {
        #[arg(long)]
        trackings: PathBuf,

        /// Date used in the subject line (default: today)
        #[arg(long)]
        date: Option<String>,

        /// Output file path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Also write the trackings as a spreadsheet CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Inspect or create the config file
    #[command(subcommand)]
    Config(config_cmd::ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        eprintln!("usage: shiprecon <COMMAND>  (see shiprecon --help)");
        return ExitCode::from(EXIT_USAGE);
    };
    let config = cli.config;

    let result = match command {
        Commands::Reconcile {
            trackings,
            orders,
            groups,
            full,
            skip_fetch,
            out,
        } => reconcile::cmd_reconcile(
            config,
            reconcile::ReconcileArgs {
                trackings,
                orders,
                groups,
                full,
                skip_fetch,
                out,
            },
        ),
        Commands::Fetch { group, full, out } => fetch::cmd_fetch(config, group, full, out),
        Commands::Export { out } => export::cmd_export(config, out),
        Commands::Digest {
            trackings,
            date,
            out,
            csv,
        } => digest::cmd_digest(trackings, date, out, csv),
        Commands::Config(command) => config_cmd::cmd_config(config, command),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Logs go to stderr so stdout stays clean for CSV output.
fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "shiprecon=debug,warn"
    } else {
        "shiprecon=info,warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.compact().init(),
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_USAGE,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_IO,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self {
            code: store_exit_code(&err),
            message: err.to_string(),
            hint: None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::MissingCredentials { env, .. } => {
                Some(format!("export {env}=... or set `password` in the group table"))
            }
            ConfigError::Read { .. } => {
                Some("run `shiprecon config init` to create a starter config".to_string())
            }
            _ => None,
        };
        Self {
            code: config_exit_code(&err),
            message: err.to_string(),
            hint,
        }
    }
}

impl From<FetchError> for CliError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Config(inner) => inner.into(),
            FetchError::Store(inner) => inner.into(),
            other => {
                let code = fetch_exit_code(&other);
                let hint = match other.root() {
                    FetchError::Auth { .. } => Some("check the group's username and password".to_string()),
                    FetchError::RateLimited { .. } => Some("wait a few minutes and retry".to_string()),
                    FetchError::UnknownGroup(_) => {
                        Some("groups are the [groups.<id>] tables in the config file".to_string())
                    }
                    _ => None,
                };
                Self {
                    code,
                    message: other.to_string(),
                    hint,
                }
            }
        }
    }
}
