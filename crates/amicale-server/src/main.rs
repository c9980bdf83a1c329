//! # amicale-server
//!
//! Reference persistence service for the Amicale messaging core:
//! - **REST API** (axum) for the conversation directory, message history,
//!   send/edit/soft-delete, and group management
//! - **In-memory chat store** enforcing participant checks, sender-only
//!   mutation, terminal deletion, read-marking, and the group-delete cascade
//! - **Media storage** for profile photos and covers (files on disk, served
//!   back under `/media/`)

mod api;
mod config;
mod error;
mod media;
mod store;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::media::MediaStore;
use crate::store::ChatStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,amicale_server=debug")),
        )
        .init();

    info!("Starting Amicale server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(
        instance = %config.instance_name,
        addr = %config.http_addr,
        registration_open = config.registration_open,
        "Loaded configuration"
    );

    let media = Arc::new(
        MediaStore::new(config.media_storage_path.clone(), config.max_media_size).await?,
    );
    let store = Arc::new(ChatStore::new());

    let http_addr = config.http_addr;
    let app_state = AppState {
        store,
        media,
        config: Arc::new(config),
    };

    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
