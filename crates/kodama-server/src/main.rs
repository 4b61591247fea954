//! kodama server binary.
//!
//! Serves the completion HTTP surface for the pad editor:
//!
//! ```bash
//! kodama-server --port 9001 --settings settings.json
//! ```

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kodama_server::{load_settings, router, AppState};

#[derive(Parser, Debug)]
#[command(name = "kodama-server", about = "HTTP surface for the kodama completion pipeline")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 9001)]
    port: u16,

    /// Path to the host settings JSON file.
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = load_settings(&args.settings);
    let state = Arc::new(AppState::new(settings));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, args.port))
        .await
        .with_context(|| format!("failed to bind port {}", args.port))?;
    info!(port = args.port, "kodama server listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
