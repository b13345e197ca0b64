use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store row encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure reported by a store implementation other than Redis.
    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed gateway payload: {0}")]
    Malformed(String),
}
