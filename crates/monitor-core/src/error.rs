use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Price source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Store write error: {0}")]
    StoreWrite(String),

    #[error("Store read error: {0}")]
    StoreRead(String),

    #[error("Alert delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
