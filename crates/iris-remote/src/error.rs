use thiserror::Error;

pub type Result<T> = std::result::Result<T, VisionError>;

/// Failures talking to the vision service.
#[derive(Debug, Error)]
pub enum VisionError {
    /// No response at all: connect refused, reset, timeout.
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("malformed {endpoint} body: {source}")]
    Body {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}
