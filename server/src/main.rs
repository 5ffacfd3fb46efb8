//! GreenThumb API Server
//!
//! HTTP front end for leaf analysis, training control, dataset management and
//! soil analysis.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use greenthumb::app::{AppConfig, AppContext};

/// GreenThumb API Server
#[derive(Parser, Debug)]
#[command(name = "greenthumb-server")]
#[command(version)]
#[command(about = "HTTP API for plant disease classification and soil analysis")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "GREENTHUMB_PORT", default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "GREENTHUMB_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Data directory (images live under <data-dir>/raw)
    #[arg(long, env = "GREENTHUMB_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Models directory (checkpoint, staging area, training history)
    #[arg(long, env = "GREENTHUMB_MODELS_DIR", default_value = "models")]
    models_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let config = AppConfig::with_dirs(&cli.data_dir, &cli.models_dir);

    info!("GreenThumb API Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Data dir:   {:?}", config.raw_dir);
    info!("  Checkpoint: {:?}", config.checkpoint_path);
    info!("  History:    {:?}", config.history_path);

    let ctx = AppContext::new(config)?;
    let app = routes::router(Arc::new(ctx));

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
