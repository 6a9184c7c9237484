use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use poseidon::core::log::init_logging;
use poseidon::core::rates::ProviderId;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Keep entries in memory instead of the on-disk store
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for poseidon::AppCommand {
    fn from(cmd: Commands) -> poseidon::AppCommand {
        match cmd {
            Commands::Run => poseidon::AppCommand::Run,
            Commands::Once => poseidon::AppCommand::Once,
            Commands::Latest { provider } => poseidon::AppCommand::Latest { provider },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Poll every configured provider until interrupted
    Run,
    /// Fetch and store one entry per provider, then exit
    Once,
    /// Show the most recent stored entries
    Latest {
        /// Only show this provider (bank_of_canada, ecb, fixer)
        #[arg(short, long)]
        provider: Option<ProviderId>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => poseidon::cli::setup::setup_at_path(path),
            None => poseidon::cli::setup::setup(),
        },
        Some(cmd) => {
            poseidon::run_command(cmd.into(), cli.config_path.as_deref(), cli.ephemeral).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
