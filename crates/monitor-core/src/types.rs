use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored price observation. Append-only: created once per coin per
/// sampling tick, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSample {
    pub asset: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub currency: String,
}

/// A spot price as returned by the upstream source for a single coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub currency: String,
}

/// A threshold crossing, handed to the alert sink and then discarded.
/// Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub asset: String,
    pub previous_price: f64,
    pub current_price: f64,
    pub percent_change: f64,
    pub currency: String,
}

/// Which price moves trigger an alert.
///
/// The upstream deployment alerted on upward moves only, so that is the
/// default; `Both` alerts on the magnitude of the move in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertDirection {
    #[default]
    UpOnly,
    Both,
}

impl AlertDirection {
    pub fn crosses(&self, percent_change: f64, threshold: f64) -> bool {
        match self {
            AlertDirection::UpOnly => percent_change >= threshold,
            AlertDirection::Both => percent_change.abs() >= threshold,
        }
    }
}

/// Tick-over-tick percentage change relative to the previous price.
pub fn percent_change(previous: f64, current: f64) -> f64 {
    (current - previous) / previous * 100.0
}
