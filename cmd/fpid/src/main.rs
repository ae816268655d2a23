//! fpid - inspect and repair enrolled fingerprint templates.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ConfigCommand, InspectCommand, RepairCommand};

/// Fingerprint template tool.
///
/// Templates are read either as base64 text (optionally with a
/// `data:image/png;base64,` prefix) or as raw PNG bytes.
#[derive(Parser)]
#[command(name = "fpid")]
#[command(about = "Fingerprint template repair and inspection tool")]
#[command(version)]
pub struct Cli {
    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output reports as JSON instead of YAML
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Repair a template and write decodable PNG bytes
    Repair(RepairCommand),
    /// Report on a template's encoding, signature and repairability
    Inspect(InspectCommand),
    /// Print the effective engine configuration
    Config(ConfigCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Repair(cmd) => cmd.run(&cli),
        Commands::Inspect(cmd) => cmd.run(&cli),
        Commands::Config(cmd) => cmd.run(&cli),
    }
}
