//! Deckshare Bridge Server
//!
//! Loopback HTTP bridge between the presentation layer and the local
//! library / community catalog.
//!
//! # Configuration
//!
//! Environment variables:
//! - `DECKSHARE_BRIDGE_ADDR`: Address to listen on (default: 127.0.0.1:7621)
//! - `DECKSHARE_DATA_DIR`: Directory for library data (default: platform data dir)
//! - `DECKSHARE_SERVER_URL`: Community catalog base URL (sharing disabled when unset)
//! - `DECKSHARE_CONFIG`: Path to config file (default: ~/.config/deckshare/config.yaml)
//!
//! # Endpoints
//!
//! - `GET /health`: Health check
//! - `/api/library/*`: Local library reads, saves, apply, delete
//! - `/api/community/*`: Catalog browse, upload, download, delete, flag

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deckshare::server::{router, AppState};
use deckshare::{Config, Library, SyncClient};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deckshare=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("DECKSHARE_CONFIG").map(PathBuf::from).ok();
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }
    tracing::info!("Data directory: {}", config.data_dir.display());

    let library = Arc::new(Mutex::new(Library::open(config.library_dir())));

    let sync = match config.server_url() {
        None => {
            tracing::info!("Community sharing disabled (no server URL configured)");
            None
        }
        Some(server_url) => {
            let device_id = match config.device_id() {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!("Failed to establish device id: {}", e);
                    std::process::exit(1);
                }
            };
            tracing::info!("Community catalog: {}", server_url);
            Some(Arc::new(SyncClient::new(
                server_url,
                device_id,
                library.clone(),
                config.cache_path(),
            )))
        }
    };

    let app = router(AppState { library, sync });

    let listener = match tokio::net::TcpListener::bind(&config.bridge_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bridge_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Bridge listening on {}", config.bridge_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
