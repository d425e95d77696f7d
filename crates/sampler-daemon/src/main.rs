use std::sync::Arc;
use std::time::Duration;

use alert_service::{AlertConfig, SmtpAlerter};
use anyhow::Result;
use coingecko_client::CoinGeckoClient;
use monitor_core::AlertSink;
use price_store::PriceStore;
use tokio::signal::unix::SignalKind;
use tokio::time::{self, MissedTickBehavior};

mod config;
mod sampler;

use config::SamplerConfig;
use sampler::Sampler;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting CoinSentry price monitor");

    let config = SamplerConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Tracked coins: {}", config.coins.len());
    tracing::info!("  Reference currency: {}", config.vs_currency);
    tracing::info!(
        "  Alert threshold: {}% ({:?})",
        config.threshold_percent,
        config.direction
    );
    tracing::info!("  Tick interval: {}s", config.tick_interval_seconds);

    sqlx::any::install_default_drivers();
    let db_pool = sqlx::AnyPool::connect(&config.database_url).await?;

    sqlx::query("SELECT 1")
        .execute(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database connectivity check failed: {}", e))?;
    tracing::info!("Startup check: database OK");

    let store = PriceStore::new(db_pool, config.vs_currency.clone());
    store.init_tables().await?;
    tracing::info!("Price store initialized");

    let source = Arc::new(CoinGeckoClient::new(
        config.coingecko_base_url.clone(),
        config.vs_currency.clone(),
    ));

    let alert_config = AlertConfig::from_env();
    let sink: Option<Arc<dyn AlertSink>> = if alert_config.is_configured() {
        match SmtpAlerter::new(&alert_config) {
            Ok(alerter) => {
                tracing::info!(
                    "Email alerts enabled (SMTP -> {} recipients)",
                    alert_config.smtp_to.len()
                );
                Some(Arc::new(alerter))
            }
            Err(e) => {
                tracing::warn!("Failed to initialize SMTP alerter: {}", e);
                None
            }
        }
    } else {
        tracing::info!("No alert channel configured (set SMTP_HOST, EMAIL_USER, RECIPIENT_EMAIL)");
        None
    };

    let sampler = Sampler::new(
        source,
        store,
        sink,
        config.coins.clone(),
        config.threshold_percent,
        config.direction,
    );

    tracing::info!(
        "Monitor is running. Sampling every {}s. Press Ctrl+C to stop.",
        config.tick_interval_seconds
    );

    // First tick fires immediately; Delay keeps at most one tick in flight
    // and pushes late triggers back instead of bursting.
    let mut interval = time::interval(Duration::from_secs(config.tick_interval_seconds));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tracing::info!("Running sampling tick...");
                match sampler.run_tick().await {
                    Ok(summary) => {
                        tracing::info!(
                            "Tick complete: {} sampled, {} skipped, {} alerts sent, {} failed, {} unrouted",
                            summary.sampled,
                            summary.skipped,
                            summary.alerts_sent,
                            summary.alerts_failed,
                            summary.alerts_unrouted
                        );
                    }
                    Err(e) => {
                        // Tick-scoped only; the next schedule proceeds.
                        tracing::error!("Tick aborted: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }
    }

    tracing::info!("CoinSentry shut down.");
    Ok(())
}
