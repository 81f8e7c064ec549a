//! Quire CLI - static API documentation site builder.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::BuildArgs;

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Build single-page API documentation sites")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to quire.toml config file
    #[arg(short, long, default_value = "quire.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site into a directory
    Build {
        /// Source directory overriding the bundled theme
        source: Option<PathBuf>,

        /// Output directory (defaults to config or "build")
        output: Option<PathBuf>,

        #[command(flatten)]
        args: BuildArgs,
    },

    /// Build in memory and serve, rebuilding on changes
    Serve {
        /// Source directory overriding the bundled theme
        source: Option<PathBuf>,

        /// Address to listen on
        #[arg(short, long)]
        address: Option<SocketAddr>,

        /// Serve the initial build without watching for changes
        #[arg(long)]
        no_watch: bool,

        #[command(flatten)]
        args: BuildArgs,
    },

    /// Copy bundled theme files into a directory for editing
    Init {
        /// Directory to extract into
        target: PathBuf,

        /// Components or files to extract (defaults to all)
        components: Vec<String>,

        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// List the bundled theme files
    Bundled,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let file = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build {
            source,
            output,
            args,
        } => {
            commands::build::run(source, output, &args, &file)?;
        }
        Commands::Serve {
            source,
            address,
            no_watch,
            args,
        } => {
            commands::serve::run(source, address, no_watch, &args, &file).await?;
        }
        Commands::Init {
            target,
            components,
            yes,
        } => {
            commands::init::run(&target, components, yes)?;
        }
        Commands::Bundled => {
            commands::bundled::run();
        }
    }

    Ok(())
}
