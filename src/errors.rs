/// Domain-specific error types for the strategy engine.
/// The decision core must:
/// - Fail fast on precondition violations (bad delta)
/// - Refuse to recommend when critical market data is missing
/// - Never fill a critical input with a made-up value
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid delta {0}: must lie strictly between 0 and 1")]
    InvalidDelta(f64),

    #[error("missing critical market data: {0}")]
    MissingCriticalData(&'static str),

    #[error("invalid account balance: {0}")]
    InvalidBalance(f64),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("market data error: {0}")]
    MarketData(String),

    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// Errors the caller can do nothing about except show "cannot recommend".
    #[inline]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::MissingCriticalData(_)
                | EngineError::InvalidBalance(_)
                | EngineError::InvalidDelta(_)
        )
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
