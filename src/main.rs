use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use printez::backend::{BackendClient, StubBackend};
use printez::config::{self, Config};
use printez::engine::Engine;
use printez::events::NoticeBus;
use printez::web;

#[derive(Debug, Parser)]
#[command(name = "printez", about = "Print job lifecycle and queue tracker")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "printez.toml")]
    config: PathBuf,

    /// Override the configured web bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        tracing::info!(path = %cli.config.display(), "loading configuration");
        config::load_config(&cli.config).map_err(|err| {
            tracing::error!(path = %cli.config.display(), error = %err, "failed to load config");
            Box::new(err) as Box<dyn std::error::Error + Send + Sync + 'static>
        })?
    } else {
        tracing::info!(path = %cli.config.display(), "no config file, using defaults");
        Config::default()
    };

    let bus = NoticeBus::default();
    let backend: Arc<dyn BackendClient> =
        Arc::new(StubBackend::new(config.backend.owner.clone(), bus.clone()));

    let bind_addr = cli.bind.unwrap_or_else(|| config.web.bind_addr.clone());
    let mut engine = Engine::new(config, backend, bus);
    engine.bootstrap().await;
    let shutdown = engine.shutdown_handle();

    // Channel between the Axum handlers and the engine task.
    let (engine_tx, engine_rx) = mpsc::channel(16);
    tokio::spawn(engine.run(engine_rx));

    let app = web::api::create_router(engine_tx);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("web API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = shutdown.send(());
        })
        .await?;

    Ok(())
}
