use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

mod api;
mod config;
mod db;
mod error;
mod jobs;
mod progress;
mod search;
mod service;

use crate::config::{load_config, load_config_from_file};
use crate::db::Database;
use crate::search::LocalSearchEngine;
use crate::service::DocQueryService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting docquery service v{}", env!("CARGO_PKG_VERSION"));

    // DOCQUERY_CONFIG names an explicit config file; otherwise `config.*` is optional
    let config = match std::env::var_os("DOCQUERY_CONFIG") {
        Some(path) => load_config_from_file(Path::new(&path))?,
        None => load_config()?,
    };
    let config = Arc::new(config);
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    // Ensure data and ingestion directories exist
    std::fs::create_dir_all(&config.storage.data_dir)?;
    std::fs::create_dir_all(&config.storage.ingestion_root)?;

    // Initialize database
    let db_path = config.storage.data_dir.join("docquery.db");
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    let engine = Arc::new(LocalSearchEngine::new(config.search.max_file_bytes));
    let service = Arc::new(DocQueryService::new(config.clone(), db, engine)?);

    let app = api::router(service);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docquery_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
