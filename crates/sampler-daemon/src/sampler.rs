use std::sync::Arc;

use chrono::Utc;
use monitor_core::{
    percent_change, AlertDirection, AlertEvent, AlertSink, MonitorError, PriceSample, PriceSource,
};
use price_store::PriceStore;

/// Per-tick counters, logged by the scheduler loop.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub sampled: usize,
    pub skipped: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    /// Threshold crossings observed while no alert channel was configured.
    pub alerts_unrouted: usize,
}

/// The fetch -> store -> compare -> notify pipeline. All collaborators are
/// injected; the sampler holds no ambient state beyond them.
pub struct Sampler {
    source: Arc<dyn PriceSource>,
    store: PriceStore,
    sink: Option<Arc<dyn AlertSink>>,
    coins: Vec<String>,
    threshold_percent: f64,
    direction: AlertDirection,
}

impl Sampler {
    pub fn new(
        source: Arc<dyn PriceSource>,
        store: PriceStore,
        sink: Option<Arc<dyn AlertSink>>,
        coins: Vec<String>,
        threshold_percent: f64,
        direction: AlertDirection,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            coins,
            threshold_percent,
            direction,
        }
    }

    /// One tick. A fetch failure aborts the whole tick (nothing inserted,
    /// nothing alerted) and is the only error returned; every per-coin
    /// failure is contained at the coin boundary so one coin never blocks
    /// the rest.
    pub async fn run_tick(&self) -> Result<TickSummary, MonitorError> {
        let quotes = self.source.fetch(&self.coins).await?;

        let mut summary = TickSummary::default();

        for coin in &self.coins {
            let Some(quote) = quotes.get(coin) else {
                tracing::info!("{}: not in upstream response, skipping", coin);
                summary.skipped += 1;
                continue;
            };

            // Baseline must be read before the insert, or the comparison
            // would be against the sample we are about to write.
            let previous = match self.store.most_recent(coin).await {
                Ok(previous) => previous,
                Err(e) => {
                    tracing::error!("{}: failed to read previous sample: {}", coin, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let current = PriceSample {
                asset: coin.clone(),
                price: quote.price,
                timestamp: Utc::now(),
                currency: quote.currency.clone(),
            };

            if let Err(e) = self.store.insert(&current).await {
                // The new baseline was not durably recorded; comparing
                // against it next tick would be wrong, so skip comparison
                // entirely for this coin.
                tracing::error!("{}: failed to store sample: {}", coin, e);
                summary.skipped += 1;
                continue;
            }
            summary.sampled += 1;

            let Some(previous) = previous else {
                tracing::info!("{}: first sample at {}, baseline established", coin, current.price);
                continue;
            };

            let change = percent_change(previous.price, current.price);
            tracing::debug!("{}: {} -> {} ({:+.2}%)", coin, previous.price, current.price, change);

            if !self.direction.crosses(change, self.threshold_percent) {
                continue;
            }

            let event = AlertEvent {
                asset: coin.clone(),
                previous_price: previous.price,
                current_price: current.price,
                percent_change: change,
                currency: current.currency.clone(),
            };

            match &self.sink {
                Some(sink) => match sink.notify(&event).await {
                    Ok(()) => {
                        tracing::info!(
                            "{}: alert sent via {} ({:+.2}%)",
                            coin,
                            sink.name(),
                            change
                        );
                        summary.alerts_sent += 1;
                    }
                    Err(e) => {
                        // The sample is already committed; delivery failure
                        // must not disturb the remaining coins.
                        tracing::warn!("{}: alert delivery failed: {}", coin, e);
                        summary.alerts_failed += 1;
                    }
                },
                None => {
                    tracing::warn!(
                        "{}: moved {:+.2}% but no alert channel is configured",
                        coin,
                        change
                    );
                    summary.alerts_unrouted += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use monitor_core::{
        AlertDirection, AlertEvent, AlertSink, MonitorError, PriceQuote, PriceSource,
    };
    use price_store::PriceStore;

    use super::Sampler;

    /// Price source that replays a scripted sequence of tick responses.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<HashMap<String, PriceQuote>, MonitorError>>>,
    }

    impl ScriptedSource {
        fn new(
            responses: Vec<Result<HashMap<String, PriceQuote>, MonitorError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        async fn fetch(
            &self,
            _assets: &[String],
        ) -> Result<HashMap<String, PriceQuote>, MonitorError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted response for this tick")
        }
    }

    /// Sink that records events, optionally failing every delivery.
    struct RecordingSink {
        events: Mutex<Vec<AlertEvent>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn events(&self) -> Vec<AlertEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn notify(&self, event: &AlertEvent) -> Result<(), MonitorError> {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                Err(MonitorError::Delivery("smtp down".into()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    async fn setup_store() -> PriceStore {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite");

        let store = PriceStore::new(pool, "usd");
        store.init_tables().await.unwrap();
        store
    }

    fn quotes(pairs: &[(&str, f64)]) -> HashMap<String, PriceQuote> {
        pairs
            .iter()
            .map(|(coin, price)| {
                (
                    coin.to_string(),
                    PriceQuote {
                        price: *price,
                        currency: "usd".to_string(),
                    },
                )
            })
            .collect()
    }

    fn coin_list(coins: &[&str]) -> Vec<String> {
        coins.iter().map(|c| c.to_string()).collect()
    }

    fn sampler(
        source: Arc<ScriptedSource>,
        store: PriceStore,
        sink: Arc<RecordingSink>,
        coins: &[&str],
    ) -> Sampler {
        Sampler::new(
            source,
            store,
            Some(sink),
            coin_list(coins),
            5.0,
            AlertDirection::UpOnly,
        )
    }

    #[tokio::test]
    async fn first_tick_establishes_baseline_without_alerting() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![Ok(quotes(&[("bitcoin", 97000.0)]))]);
        let sink = RecordingSink::new(false);
        let s = sampler(source, store.clone(), sink.clone(), &["bitcoin"]);

        let summary = s.run_tick().await.unwrap();

        assert_eq!(summary.sampled, 1);
        assert_eq!(summary.alerts_sent, 0);
        assert_eq!(store.query(Some("bitcoin"), 100).await.unwrap().len(), 1);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn change_at_exact_threshold_alerts() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("bitcoin", 100.0)])),
            Ok(quotes(&[("bitcoin", 105.0)])),
        ]);
        let sink = RecordingSink::new(false);
        let s = sampler(source, store, sink.clone(), &["bitcoin"]);

        s.run_tick().await.unwrap();
        let summary = s.run_tick().await.unwrap();

        assert_eq!(summary.alerts_sent, 1);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].previous_price, 100.0);
        assert_eq!(events[0].current_price, 105.0);
        assert_eq!(events[0].percent_change, 5.0);
    }

    #[tokio::test]
    async fn change_just_below_threshold_does_not_alert() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("bitcoin", 100.0)])),
            Ok(quotes(&[("bitcoin", 104.99)])),
        ]);
        let sink = RecordingSink::new(false);
        let s = sampler(source, store, sink.clone(), &["bitcoin"]);

        s.run_tick().await.unwrap();
        let summary = s.run_tick().await.unwrap();

        assert_eq!(summary.alerts_sent, 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn drops_do_not_alert_in_up_only_mode_but_do_in_both() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("bitcoin", 100.0)])),
            Ok(quotes(&[("bitcoin", 90.0)])),
        ]);
        let sink = RecordingSink::new(false);
        let s = sampler(source, store.clone(), sink.clone(), &["bitcoin"]);

        s.run_tick().await.unwrap();
        s.run_tick().await.unwrap();
        assert!(sink.events().is_empty());

        // Same history, symmetric policy: the 10% drop from 90 to 81 alerts.
        let source = ScriptedSource::new(vec![Ok(quotes(&[("bitcoin", 81.0)]))]);
        let sink = RecordingSink::new(false);
        let s = Sampler::new(
            source,
            store,
            Some(sink.clone()),
            coin_list(&["bitcoin"]),
            5.0,
            AlertDirection::Both,
        );

        let summary = s.run_tick().await.unwrap();
        assert_eq!(summary.alerts_sent, 1);
        assert_eq!(sink.events()[0].percent_change, -10.0);
    }

    #[tokio::test]
    async fn coin_missing_from_response_is_skipped_without_insert() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![Ok(quotes(&[("bitcoin", 100.0)]))]);
        let sink = RecordingSink::new(false);
        let s = sampler(source, store.clone(), sink, &["bitcoin", "delisted-coin"]);

        let summary = s.run_tick().await.unwrap();

        assert_eq!(summary.sampled, 1);
        assert_eq!(summary.skipped, 1);
        assert!(store.query(Some("delisted-coin"), 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_aborts_tick_with_no_inserts_or_alerts() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![Err(MonitorError::SourceUnavailable(
            "connection refused".into(),
        ))]);
        let sink = RecordingSink::new(false);
        let s = sampler(source, store.clone(), sink.clone(), &["bitcoin", "ethereum"]);

        let err = s.run_tick().await.expect_err("tick must abort");

        assert!(matches!(err, MonitorError::SourceUnavailable(_)));
        assert!(store.query(None, 100).await.unwrap().is_empty());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn store_write_failure_for_one_coin_does_not_affect_others() {
        // A CHECK constraint stands in for a persistence failure: the
        // negative quote for one coin fails its insert, the other commits.
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite");
        sqlx::query(
            "CREATE TABLE prices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                coin TEXT NOT NULL,
                price REAL NOT NULL CHECK (price > 0),
                timestamp TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        let store = PriceStore::new(pool, "usd");

        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("bitcoin", 100.0), ("ethereum", 100.0)])),
            Ok(quotes(&[("bitcoin", -1.0), ("ethereum", 110.0)])),
        ]);
        let sink = RecordingSink::new(false);
        let s = sampler(source, store.clone(), sink.clone(), &["bitcoin", "ethereum"]);

        s.run_tick().await.unwrap();
        let summary = s.run_tick().await.unwrap();

        // bitcoin's write failed and was contained; ethereum stored and alerted.
        assert_eq!(summary.sampled, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.alerts_sent, 1);
        assert_eq!(sink.events()[0].asset, "ethereum");
        assert_eq!(store.query(Some("bitcoin"), 100).await.unwrap().len(), 1);
        assert_eq!(store.most_recent("ethereum").await.unwrap().unwrap().price, 110.0);
    }

    #[tokio::test]
    async fn delivery_failure_keeps_sample_and_later_coins_process() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("bitcoin", 100.0), ("ethereum", 50.0)])),
            Ok(quotes(&[("bitcoin", 110.0), ("ethereum", 55.0)])),
        ]);
        let sink = RecordingSink::new(true);
        let s = sampler(source, store.clone(), sink.clone(), &["bitcoin", "ethereum"]);

        s.run_tick().await.unwrap();
        let summary = s.run_tick().await.unwrap();

        // Both coins crossed the threshold, both deliveries failed, both
        // samples are still committed.
        assert_eq!(summary.alerts_failed, 2);
        assert_eq!(summary.sampled, 2);
        assert_eq!(sink.events().len(), 2);
        assert_eq!(store.most_recent("bitcoin").await.unwrap().unwrap().price, 110.0);
        assert_eq!(store.most_recent("ethereum").await.unwrap().unwrap().price, 55.0);
    }

    #[tokio::test]
    async fn crossing_without_a_sink_counts_as_unrouted_not_failed() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("bitcoin", 100.0)])),
            Ok(quotes(&[("bitcoin", 110.0)])),
        ]);
        let s = Sampler::new(
            source,
            store.clone(),
            None,
            coin_list(&["bitcoin"]),
            5.0,
            AlertDirection::UpOnly,
        );

        s.run_tick().await.unwrap();
        let summary = s.run_tick().await.unwrap();

        assert_eq!(summary.alerts_unrouted, 1);
        assert_eq!(summary.alerts_failed, 0);
        assert_eq!(summary.alerts_sent, 0);
        // The sample is still committed either way.
        assert_eq!(store.most_recent("bitcoin").await.unwrap().unwrap().price, 110.0);
    }

    #[tokio::test]
    async fn baseline_always_advances_to_latest_successful_tick() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("bitcoin", 100.0)])),
            Ok(quotes(&[("bitcoin", 101.0)])),
            Ok(quotes(&[("bitcoin", 102.0)])),
            Ok(quotes(&[("bitcoin", 103.0)])),
        ]);
        let sink = RecordingSink::new(false);
        let s = sampler(source, store.clone(), sink, &["bitcoin"]);

        for expected in [100.0, 101.0, 102.0, 103.0] {
            s.run_tick().await.unwrap();
            let latest = store.most_recent("bitcoin").await.unwrap().unwrap();
            assert_eq!(latest.price, expected);
        }
    }

    #[tokio::test]
    async fn two_coin_end_to_end_scenario() {
        let store = setup_store().await;
        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("bitcoin", 100.0), ("ethereum", 50.0)])),
            Ok(quotes(&[("bitcoin", 106.0), ("ethereum", 50.0)])),
        ]);
        let sink = RecordingSink::new(false);
        let s = sampler(source, store.clone(), sink.clone(), &["bitcoin", "ethereum"]);

        let first = s.run_tick().await.unwrap();
        assert_eq!(first.sampled, 2);
        assert_eq!(first.alerts_sent, 0);

        let second = s.run_tick().await.unwrap();
        assert_eq!(second.sampled, 2);
        assert_eq!(second.alerts_sent, 1);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].asset, "bitcoin");
        assert_eq!(events[0].percent_change, 6.0);
        assert_eq!(events[0].currency, "usd");

        assert_eq!(store.query(Some("bitcoin"), 100).await.unwrap().len(), 2);
        assert_eq!(store.query(Some("ethereum"), 100).await.unwrap().len(), 2);
    }
}
