use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use config::CliConfig;

/// Lion pool command line interface
///
/// Runs a PING/PONG server and exercises pools of TCP connections against it.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format: text or json
    #[clap(long, default_value = "text", global = true)]
    log_format: String,

    /// Path to a TOML configuration file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a PING/PONG server until killed
    Serve(commands::serve::ServeArgs),

    /// Exercise a connection pool with concurrent clients
    Exercise(commands::exercise::ExerciseArgs),

    /// Print the effective configuration as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    match cli.log_format.as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    };

    log::debug!("Loading config from {:?}", cli.config);
    let config = CliConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Serve(args) => commands::serve::execute(args, &config),
        Commands::Exercise(args) => commands::exercise::execute(args, &config),
        Commands::Config(args) => commands::config::execute(args, &config),
    }
}
