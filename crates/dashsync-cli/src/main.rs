mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dashsync_config::SheetKind;

#[derive(Parser)]
#[command(
    name = "dashsync",
    version,
    about = "Fill marketing dashboard workbooks from analytics, Bitly and Mailchimp"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the dashboard workbooks of the configured accounts
    Run {
        /// Path to the settings file (YAML, or JSON by extension)
        #[arg(long)]
        config: PathBuf,
        /// Only run these accounts (repeatable)
        #[arg(long = "account")]
        accounts: Vec<String>,
        /// Only reconcile these sheet kinds (repeatable)
        #[arg(long = "sheet")]
        sheets: Vec<SheetKind>,
    },
    /// Load and validate a settings file, reporting every issue
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the JSON schema of the settings file
    Schema,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            accounts,
            sheets,
        } => commands::run::execute(&config, &accounts, &sheets),
        Commands::Check { config } => commands::check::execute(&config),
        Commands::Schema => {
            commands::schema::execute();
            Ok(())
        }
    }
}
