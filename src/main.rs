use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_relay::config::RelayConfig;
use booking_relay::dedupe::{self, DedupCache};
use booking_relay::delivery::HttpSink;
use booking_relay::relay::{RelayOptions, RelayOrchestrator};
use booking_relay::server::{self, AppState};
use booking_relay::source::HttpStore;
use booking_relay::stats::RelayStats;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env()?;
    tracing::info!(
        source_url = %config.source_url,
        sink_url = %config.sink_url,
        production = config.production,
        "Starting booking relay"
    );

    let store = Arc::new(HttpStore::new(config.source_url.clone())?);
    let sink = Arc::new(HttpSink::new(config.sink_url.clone(), config.sink_timeout)?);
    let cache = Arc::new(DedupCache::new(config.cache_capacity));
    let stats = Arc::new(RelayStats::new());

    let shutdown = CancellationToken::new();

    let eviction = dedupe::spawn_eviction_task(
        cache.clone(),
        dedupe::DEFAULT_EVICTION_INTERVAL,
        shutdown.clone(),
    );

    let options = RelayOptions::from_config(&config);
    let orchestrator = RelayOrchestrator::new(store, sink, cache, stats.clone(), options);
    let relay = tokio::spawn(orchestrator.run(shutdown.clone()));

    let app = server::router(AppState::new(stats));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Health server listening on {}", addr);

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Health server failed");
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, draining");
    shutdown.cancel();

    // The relay drains in-flight deliveries before resolving.
    let _ = relay.await;
    let _ = eviction.await;
    let _ = server.await;

    tracing::info!("Booking relay stopped");
    Ok(())
}
