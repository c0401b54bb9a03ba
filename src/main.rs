//! hivecache - A peer-distributed in-process cache server
//!
//! Runs one cache node: a "scores" demo group backed by a slow in-memory
//! table, the peer-to-peer fetch endpoint, and (unless disabled) the
//! public API.

mod api;
mod byteview;
mod cache;
mod config;
mod error;
mod group;
mod http;
mod models;
mod peers;
mod ring;
mod singleflight;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{create_router, peer_router, AppState};
use config::Config;
use error::GroupError;
use group::{GetterFn, Group, Registry};
use http::HttpPool;

/// Stand-in for a slow backing store the cache sits in front of.
fn create_group(registry: &Registry, cache_bytes: i64) -> Arc<Group> {
    let db: HashMap<&str, &str> = HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]);

    registry.new_group(
        "scores",
        cache_bytes,
        Arc::new(GetterFn(move |key: &str| {
            info!(key, "[slow-db] search");
            db.get(key)
                .map(|v| v.as_bytes().to_vec())
                .ok_or_else(|| GroupError::NotFound(key.to_string()))
        })),
    )
}

/// Main entry point for the hivecache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Parse configuration from flags and environment variables
/// 3. Create the group registry and the demo group
/// 4. Wire the peer pool if a peer list is configured
/// 5. Create the Axum router (full or peer-only)
/// 6. Start the HTTP server on the configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hivecache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hivecache server");

    let config = Config::parse();
    info!(
        "Configuration loaded: port={}, strategy={}, cache_bytes={}, replicas={}, peers={}",
        config.port,
        config.cache_strategy,
        config.cache_bytes,
        config.replicas,
        config.peers.len(),
    );

    let registry = Arc::new(Registry::new(config.cache_options()));
    let group = create_group(&registry, config.cache_bytes);
    info!("Group '{}' registered", group.name());

    // With no peer list this node runs standalone and every miss goes to
    // the local source
    if !config.peers.is_empty() {
        let pool = Arc::new(HttpPool::with_replicas(
            config.advertise_addr(),
            config.replicas,
        ));
        pool.set_peers(config.peers.clone());
        group.register_peers(pool);
        info!("Peer pool configured as {}", config.advertise_addr());
    }

    let state = AppState::new(registry);
    let app = if config.api {
        create_router(state)
    } else {
        peer_router(state)
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
