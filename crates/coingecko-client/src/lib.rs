use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use monitor_core::{MonitorError, PriceQuote, PriceSource};
use reqwest::Client;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";

/// CoinGecko `/simple/price` client. One GET per fetch for the whole
/// tracked set, no retries — a failed fetch is the caller's decision.
#[derive(Clone)]
pub struct CoinGeckoClient {
    base_url: String,
    vs_currency: String,
    client: Client,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>, vs_currency: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into(),
            vs_currency: vs_currency.into(),
            client,
        }
    }

    pub fn vs_currency(&self) -> &str {
        &self.vs_currency
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch(&self, assets: &[String]) -> Result<HashMap<String, PriceQuote>, MonitorError> {
        let url = format!("{}/api/v3/simple/price", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("ids", assets.join(",")),
                ("vs_currencies", self.vs_currency.clone()),
            ])
            .send()
            .await
            .map_err(|e| MonitorError::SourceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MonitorError::SourceUnavailable(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        // Payload shape: { "bitcoin": { "usd": 97123.0 }, ... }
        let payload: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .map_err(|e| MonitorError::SourceUnavailable(e.to_string()))?;

        let mut quotes = HashMap::with_capacity(payload.len());
        for (coin, prices) in payload {
            match prices.get(&self.vs_currency) {
                Some(&price) => {
                    quotes.insert(
                        coin,
                        PriceQuote {
                            price,
                            currency: self.vs_currency.clone(),
                        },
                    );
                }
                None => {
                    // Same as the upstream omitting the coin entirely.
                    tracing::info!("CoinGecko returned {} without a {} price", coin, self.vs_currency);
                }
            }
        }

        Ok(quotes)
    }
}
