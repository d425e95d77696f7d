use std::collections::HashMap;

use async_trait::async_trait;

use crate::{AlertEvent, MonitorError, PriceQuote};

/// Upstream spot-price provider. One `fetch` is one network round trip for
/// the whole tracked set; the result may omit coins the upstream does not
/// know, so callers must check presence before use. Retry policy belongs to
/// the caller, not the source.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, assets: &[String]) -> Result<HashMap<String, PriceQuote>, MonitorError>;
}

/// Outbound notification channel. Exactly one dispatch attempt per call;
/// delivery failure is a recoverable value for the caller.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, event: &AlertEvent) -> Result<(), MonitorError>;

    fn name(&self) -> &str;
}
