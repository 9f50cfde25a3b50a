use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Upstream returned HTTP {0}")]
    Http(reqwest::StatusCode),
    #[error("Payload decode error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Payload too large: {size} bytes (max {max} bytes)")]
    PayloadTooLarge { size: usize, max: usize },
}
