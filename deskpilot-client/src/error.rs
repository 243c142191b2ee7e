//! Error types for the DeskPilot client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the DeskPilot client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
        /// Underlying failure reported alongside the message, if any
        details: Option<String>,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl ClientError {
    /// Create an API error from status code and response body
    ///
    /// JSON bodies of the form `{"error": ..., "details": ...}` are unpacked;
    /// anything else becomes the message verbatim.
    pub fn api_error(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();

        let parsed = serde_json::from_str::<serde_json::Value>(&body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|value| value.get(name))
                .and_then(|value| value.as_str())
                .map(str::to_string)
        };

        Self::ApiError {
            status,
            message: field("error").unwrap_or(body.clone()),
            details: field("details"),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }
}
