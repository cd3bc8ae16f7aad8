//! hubd - real-time connection hub.
//!
//! Accepts authenticated WebSocket connections, fans chat, typing, presence
//! and live-stream events out to the right connections, and keeps everything
//! that is not connection state behind collaborator traits.

mod config;
mod error;
mod handlers;
mod http;
mod metrics;
mod network;
mod security;
mod services;
mod state;
mod telemetry;

use crate::config::Config;
use crate::network::Gateway;
use crate::security::RateLimitManager;
use crate::services::{Collaborators, MemoryDirectory, StaticTokenAuthenticator};
use crate::state::{Hub, HubParams};
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often idle per-IP limiters and stale presence entries are pruned.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

/// How long an offline user's last-seen is kept, in hours.
const LAST_SEEN_RETENTION_HOURS: i64 = 24;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        address = %config.listen.address,
        "Starting hubd"
    );

    if config.auth.tokens.is_empty() {
        warn!("No [[auth.tokens]] configured; every connection will be rejected");
    }

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");

        tokio::spawn(async move {
            http::run_http_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let services = Collaborators::in_memory(
        StaticTokenAuthenticator::from_config(&config.auth),
        Arc::new(MemoryDirectory::from_config(&config.directory)),
    );
    let hub = Hub::spawn(HubParams {
        limits: config.limits.clone(),
        services,
    });
    info!(
        conversations = config.directory.conversations.len(),
        tokens = config.auth.tokens.len(),
        "Hub started"
    );

    let rate_limiter = Arc::new(RateLimitManager::new(
        config.security.rate_limits.clone(),
    ));

    // Rate limiter and last-seen pruning task
    {
        let rate_limiter = Arc::clone(&rate_limiter);
        let hub = Arc::clone(&hub);
        let mut shutdown = hub.subscribe_shutdown();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = interval.tick() => {
                        let before = rate_limiter.tracked_ips();
                        rate_limiter.cleanup();
                        let cutoff = Utc::now() - TimeDelta::hours(LAST_SEEN_RETENTION_HOURS);
                        let forgotten = hub.presence.prune_offline(cutoff);
                        info!(
                            before,
                            after = rate_limiter.tracked_ips(),
                            forgotten,
                            "Maintenance pass"
                        );
                    }
                }
            }
        });
    }

    // Ctrl-C closes every connection with 1001 and stops the gateway.
    {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown requested");
                    hub.shutdown();
                }
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
        });
    }

    let gateway = Gateway::bind(&config, Arc::clone(&hub), rate_limiter).await?;
    gateway.run().await?;

    // Give workers a moment to flush their Close frames.
    tokio::time::sleep(Duration::from_millis(250)).await;
    info!("hubd stopped");
    Ok(())
}
