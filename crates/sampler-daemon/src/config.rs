use anyhow::{bail, Result};
use monitor_core::AlertDirection;
use std::env;

/// Coins the original deployment tracked; overridable via TRACKED_COINS.
const DEFAULT_COINS: &str = "bitcoin,ethereum,ripple,tether,solana,binancecoin,dogecoin,tron,\
chainlink,weth,litecoin,official-trump,pepe,binance-staked-sol,mantle-staked-ether,msol,solv-btc";

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub coins: Vec<String>,
    pub vs_currency: String,
    pub threshold_percent: f64,
    pub direction: AlertDirection,
    pub tick_interval_seconds: u64,
    pub database_url: String,
    pub coingecko_base_url: String,
}

impl SamplerConfig {
    pub fn from_env() -> Result<Self> {
        let coins: Vec<String> = env::var("TRACKED_COINS")
            .unwrap_or_else(|_| DEFAULT_COINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let direction = match env::var("ALERT_DIRECTION").unwrap_or_default().as_str() {
            "both" => AlertDirection::Both,
            _ => AlertDirection::UpOnly,
        };

        let config = Self {
            coins,
            vs_currency: env::var("VS_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            threshold_percent: env::var("ALERT_THRESHOLD_PERCENT")
                .unwrap_or_else(|_| "5.0".to_string())
                .parse()?,
            direction,
            // 12 hours, the original cron cadence
            tick_interval_seconds: env::var("TICK_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "43200".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://crypto.db?mode=rwc".to_string()),
            coingecko_base_url: env::var("COINGECKO_BASE_URL")
                .unwrap_or_else(|_| coingecko_client::DEFAULT_BASE_URL.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.coins.is_empty() {
            bail!("TRACKED_COINS must name at least one coin");
        }
        if self.threshold_percent <= 0.0 {
            bail!(
                "ALERT_THRESHOLD_PERCENT must be positive, got {}",
                self.threshold_percent
            );
        }
        if self.tick_interval_seconds == 0 {
            bail!("TICK_INTERVAL_SECONDS must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_coin_list_matches_tracked_set() {
        let coins: Vec<&str> = DEFAULT_COINS.split(',').collect();
        assert_eq!(coins.len(), 17);
        assert!(coins.contains(&"bitcoin"));
        assert!(coins.contains(&"solv-btc"));
    }
}
