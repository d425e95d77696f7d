use chrono::{DateTime, NaiveDateTime, Utc};
use monitor_core::{MonitorError, PriceSample};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only price history over the `prices` relation. Rows are never
/// updated or deleted; "most recent" is greatest timestamp, ties broken by
/// insertion order.
#[derive(Clone)]
pub struct PriceStore {
    pool: sqlx::AnyPool,
    currency: String,
}

impl PriceStore {
    /// `currency` is the reference currency every stored price is quoted in;
    /// the relation itself only carries (coin, price, timestamp).
    pub fn new(pool: sqlx::AnyPool, currency: impl Into<String>) -> Self {
        Self {
            pool,
            currency: currency.into(),
        }
    }

    /// Idempotent schema setup.
    pub async fn init_tables(&self) -> Result<(), MonitorError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS prices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                coin TEXT NOT NULL,
                price REAL NOT NULL,
                timestamp TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MonitorError::StoreWrite(e.to_string()))?;

        Ok(())
    }

    /// Durable append of one sample. Single statement, so a failure leaves
    /// previously stored rows untouched.
    pub async fn insert(&self, sample: &PriceSample) -> Result<(), MonitorError> {
        sqlx::query("INSERT INTO prices (coin, price, timestamp) VALUES (?, ?, ?)")
            .bind(&sample.asset)
            .bind(sample.price)
            .bind(sample.timestamp.format(TIMESTAMP_FORMAT).to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| MonitorError::StoreWrite(e.to_string()))?;

        Ok(())
    }

    /// The latest stored sample for a coin, or None before its first tick.
    /// Reflects all prior successful inserts on this pool.
    pub async fn most_recent(&self, asset: &str) -> Result<Option<PriceSample>, MonitorError> {
        let row: Option<(String, f64, String)> = sqlx::query_as(
            "SELECT coin, price, timestamp FROM prices
             WHERE coin = ? ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(asset)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MonitorError::StoreRead(e.to_string()))?;

        row.map(|r| self.sample_from_row(r)).transpose()
    }

    /// Stored samples, newest first, optionally filtered to one coin. This
    /// is the read-side query shape; the sampling pipeline itself only needs
    /// `most_recent`.
    pub async fn query(
        &self,
        asset: Option<&str>,
        limit: i64,
    ) -> Result<Vec<PriceSample>, MonitorError> {
        let rows: Vec<(String, f64, String)> = match asset {
            Some(coin) => {
                sqlx::query_as(
                    "SELECT coin, price, timestamp FROM prices
                     WHERE coin = ? ORDER BY timestamp DESC, id DESC LIMIT ?",
                )
                .bind(coin)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    "SELECT coin, price, timestamp FROM prices
                     ORDER BY timestamp DESC, id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| MonitorError::StoreRead(e.to_string()))?;

        rows.into_iter().map(|r| self.sample_from_row(r)).collect()
    }

    fn sample_from_row(&self, (coin, price, timestamp): (String, f64, String)) -> Result<PriceSample, MonitorError> {
        let naive = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| MonitorError::StoreRead(format!("bad timestamp {timestamp:?}: {e}")))?;

        Ok(PriceSample {
            asset: coin,
            price,
            timestamp: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
            currency: self.currency.clone(),
        })
    }
}
