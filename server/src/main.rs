//! Folio sync server.
//!
//! Serves the websocket sync endpoint plus a small admin HTTP API:
//!
//! Usage:
//!   folio-server --port 8080 --http-port 8081 --database folio.db

use anyhow::{Context, Result};
use clap::Parser;
use folio_server::connection::serve_connection;
use folio_server::{build_router, AdminState, Services};
use folio_storage::EntityStore;
use folio_sync::limiter::RESET_INTERVAL;
use folio_sync::sweeper::{
    spawn_counter_reset, spawn_subscription_sweep, SUBSCRIPTION_RETENTION,
    SUBSCRIPTION_SWEEP_INTERVAL,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "folio-server")]
#[command(about = "Folio real-time hierarchy sync server")]
struct Args {
    /// Port for the websocket endpoint
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// HTTP port for the admin API
    #[arg(long, default_value = "8081")]
    http_port: u16,

    /// Path to the SQLite database file
    #[arg(short, long, default_value = "folio.db")]
    database: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Folio server starting...");
    let store = Arc::new(
        EntityStore::open(&args.database)
            .with_context(|| format!("failed to open database at {:?}", args.database))?,
    );
    let services = Arc::new(Services::new(store));

    spawn_counter_reset(services.limiter.clone(), RESET_INTERVAL);
    spawn_subscription_sweep(
        services.store.clone(),
        SUBSCRIPTION_SWEEP_INTERVAL,
        SUBSCRIPTION_RETENTION,
    );

    let admin_state = AdminState {
        store: services.store.clone(),
        limiter: services.limiter.clone(),
    };
    let http_port = args.http_port;
    tokio::spawn(async move {
        let app = build_router(admin_state);
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", http_port))
            .await
            .expect("Failed to bind HTTP port");
        info!("admin API listening on port {}", http_port);
        axum::serve(listener, app).await.expect("HTTP server failed");
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .with_context(|| format!("failed to bind websocket port {}", args.port))?;
    info!("websocket endpoint listening on port {}", args.port);
    info!("database: {:?}", args.database);

    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        let services = services.clone();
        tokio::spawn(async move {
            serve_connection(services, stream, peer).await;
        });
    }
}
