use std::path::PathBuf;

use clap::{Parser, Subcommand};
use redirect_handover::config::{load_config, HandoverConfig};
use redirect_handover::observability::init_logging;
use redirect_handover::Handover;

#[derive(Parser)]
#[command(name = "handover-cli")]
#[command(about = "Inspect and remove redirect handover rules", long_about = None)]
struct Cli {
    /// Configuration file; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    namespace: Option<String>,

    #[arg(short = 'p', long)]
    incoming_port: Option<u16>,

    /// Run iptables through sudo.
    #[arg(long)]
    sudo: bool,

    /// Include the loopback (OUTPUT) chain.
    #[arg(long)]
    loopback: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove every rule of the namespace
    Cleanup,
    /// Print the namespace's rules as JSON
    List,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HandoverConfig::default(),
    };
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }
    if let Some(port) = cli.incoming_port {
        config.incoming_port = port;
    }
    config.engine.use_sudo |= cli.sudo;
    config.chains.loopback |= cli.loopback;

    init_logging(&config.observability.log_level);
    let handover = Handover::from_config(&config)?;

    match cli.command {
        Commands::Cleanup => {
            let deleted = handover.cleanup()?;
            println!("deleted {} rule(s) in namespace {}", deleted, handover.namespace());
        }
        Commands::List => {
            let rules = handover.rules()?;
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
    }

    Ok(())
}
