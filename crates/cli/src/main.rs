//! Sahayak CLI: the main entry point.
//!
//! Commands:
//! - `serve`       Start the HTTP gateway
//! - `deployment`  Ensure, create, show or delete the agent deployment
//! - `session`     Create, list, read or delete a user's sessions
//! - `ask`         Send one turn and print the reply
//! - `config`      Print the default configuration

use clap::{Parser, Subcommand};
use sahayak_config::{AppConfig, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "sahayak",
    about = "Sahayak: a multi-agent teaching assistant backend",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage the agent deployment
    Deployment {
        #[command(subcommand)]
        action: commands::deployment::Action,
    },

    /// Manage user sessions
    Session {
        #[command(subcommand)]
        action: commands::session::Action,
    },

    /// Send one turn and print the reply
    Ask(commands::ask::AskArgs),

    /// Print the default configuration
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,
    },
}

fn init_tracing(verbose: bool, logging: &LoggingConfig) {
    let fallback = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { path } = cli.command {
        return commands::config_cmd::run(path);
    }

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;
    init_tracing(cli.verbose, &config.logging);

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Deployment { action } => commands::deployment::run(config, action).await?,
        Commands::Session { action } => commands::session::run(config, action).await?,
        Commands::Ask(args) => commands::ask::run(config, args).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
