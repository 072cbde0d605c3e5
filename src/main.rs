/// APIA command line
///
/// `build` compiles and packages a source tree, `validate` checks one without
/// writing anything, and `serve` runs the flow runtime over a build directory.

use anyhow::Result;
use apia::{config::Config, masterlist, server::start_server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apia", version, about = "Declarative flow compiler and runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the source tree and write the build directory
    Build {
        /// Source directory holding flows/, subflows/ and config/
        #[arg(long)]
        src: Option<PathBuf>,
        /// Output directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Keep existing build output instead of removing it first
        #[arg(long)]
        no_clean: bool,
    },
    /// Check uniqueness and references without writing anything
    Validate {
        #[arg(long)]
        src: Option<PathBuf>,
    },
    /// Serve flows from a build directory
    Serve {
        #[arg(long)]
        build_dir: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Re-create connector instances on every call
        #[arg(long)]
        reload_connectors: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Defaults come from APIA_* environment variables
    let mut config = Config::default();

    match cli.command {
        Command::Build { src, out, no_clean } => {
            let src = src.unwrap_or_else(|| PathBuf::from(&config.build.src_dir));
            let out = out.unwrap_or_else(|| PathBuf::from(&config.build.build_dir));
            let stats = masterlist::build(&src, &out, !no_clean)?;
            tracing::info!(
                "✅ Build complete: {} flows indexed, {} router references, {} files copied",
                stats.masterlist_entries,
                stats.router_references,
                stats.files_copied
            );
        }
        Command::Validate { src } => {
            let src = src.unwrap_or_else(|| PathBuf::from(&config.build.src_dir));
            let project = masterlist::validate(&src)?;
            tracing::info!("✅ {} flows validated", project.compilation.index.len());
        }
        Command::Serve {
            build_dir,
            host,
            port,
            reload_connectors,
        } => {
            if let Some(build_dir) = build_dir {
                config.build.build_dir = build_dir;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.runtime.reload_connectors |= reload_connectors;
            start_server(config).await?;
        }
    }

    Ok(())
}
