use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trading schedule lookup failed: {0}")]
    ScheduleLookup(String),

    #[error("Trading session failed: {0}")]
    Session(String),

    #[error("Candle download failed: {0}")]
    CandleSource(String),

    #[error("No account is ready for trading")]
    AccountNotFound,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
