//! TTL Cache demo
//!
//! Fills a cache with entries of different lifetimes, prints the live
//! snapshot as JSON, and prints it again once the short-lived entries have
//! been reaped.

use std::time::Duration;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_cache::{Config, TtlCache};

/// How long the demo waits for the reaper before printing the second snapshot.
const OBSERVE_FOR: Duration = Duration::from_secs(3);

/// Main entry point for the TTL cache demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache, which starts its reaper
/// 4. Store entries with short and long lifetimes
/// 5. Wait for the reaper (or Ctrl+C/SIGTERM) and report what is left
/// 6. Close the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: idle_rearm={}s",
        config.idle_rearm.as_secs()
    );

    let cache: TtlCache<String> = TtlCache::new(config)?;

    cache.set("session:alpha", "short-lived".to_string(), Duration::from_millis(500))?;
    cache.set("session:beta", "long-lived".to_string(), Duration::from_secs(60))?;
    cache.set("session:gamma", "renewed".to_string(), Duration::from_millis(200))?;
    cache.renew_expiry("session:gamma", Duration::from_secs(30))?;

    println!("{}", serde_json::to_string_pretty(&cache.enumerate()?)?);

    tokio::select! {
        () = tokio::time::sleep(OBSERVE_FOR) => {}
        () = shutdown_signal() => {}
    }

    println!("{}", serde_json::to_string_pretty(&cache.enumerate()?)?);
    println!("{}", serde_json::to_string_pretty(&cache.stats()?)?);

    cache.close()?;
    info!("Demo complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping early...");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping early...");
        }
    }
}
