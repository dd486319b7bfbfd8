use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod collect;
mod compile;
mod config;
mod scan;

use config::CollectArgs;

#[derive(Parser)]
#[command(name = "faceset", version, about = "Build a face training set from photos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract faces matching REFERENCE_DIR from the photos under SOURCE_DIR
    Collect(CollectArgs),
    /// Copy collected images into a flat directory with sequential names
    Compile {
        /// Output directory of a previous `collect` run
        source_dir: PathBuf,
        /// Directory to copy the renamed images into
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Collect(args) => collect::run(args),
        Commands::Compile { source_dir, output_dir } => {
            let copied = compile::run(&source_dir, &output_dir)?;
            println!("Copied {copied} images to {}", output_dir.display());
            Ok(())
        }
    }
}
