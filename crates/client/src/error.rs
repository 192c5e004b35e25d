/// Errors from the layout and ACL HTTP APIs.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("Layout API error ({status}): {message}")]
    Api {
        status: u16,
        /// The `error` field of the JSON error body, or the raw body.
        message: String,
    },

    /// A 2xx response whose body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The configured base URL cannot carry path segments.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether retrying the same request later may succeed.
    ///
    /// Transport failures, 408, 429 and 5xx are transient. Other 4xx
    /// responses, decode failures and URL errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Request(_) => true,
            ClientError::Api { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            ClientError::Decode(_) | ClientError::InvalidUrl(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
