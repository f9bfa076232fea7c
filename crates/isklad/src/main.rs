//! Isklad cart-widget middleware.
//!
//! Main entry point for the middleware server CLI.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use isklad_config::MiddlewareConfig;
use isklad_server::{AppState, Server};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Isklad cart-widget middleware
#[derive(Parser)]
#[command(name = "isklad")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the middleware server
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "isklad.toml", env = "ISKLAD_CONFIG")]
    config: PathBuf,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<SocketAddr>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => serve(args, cli.verbose).await,
    }
}

async fn serve(args: ServeArgs, verbose: bool) -> Result<()> {
    let mut config = MiddlewareConfig::from_toml_file(&args.config)?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    let _guard = init_tracing(verbose, &config.data_dir);

    tracing::info!(
        config = %args.config.display(),
        eshop_id = config.eshop_id,
        "isklad middleware starting"
    );
    if config.disable_csrf_verification {
        tracing::warn!("CSRF verification is DISABLED, local development only");
    }

    let server = Server::new(AppState::new(config));
    server.run().await?;
    Ok(())
}

/// Initialize tracing: console output plus a rotating JSON file.
///
/// The returned guard must stay alive for the file writer to flush.
fn init_tracing(verbose: bool, data_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = if verbose {
        "isklad=debug,isklad_server=debug,isklad_client=debug,isklad_session=debug,isklad_config=debug,info"
    } else {
        "isklad=info,isklad_server=info,isklad_client=info,warn"
    };

    let file_appender = tracing_appender::rolling::daily(data_dir.join("logs"), "isklad.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "isklad=trace,isklad_server=trace,isklad_client=trace,info",
                )),
        )
        .init();

    guard
}
