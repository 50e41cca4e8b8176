//! Error types for the cloud API layer.

use thiserror::Error;

/// Errors that can occur during cloud API operations.
#[derive(Error, Debug)]
pub enum CloudError {
    /// The referenced resource does not exist remotely.
    #[error("Resource not found")]
    NotFound,

    /// The remote API rejected the request.
    #[error("API error {code}: {message}")]
    Api {
        /// Machine-readable error code from the remote error envelope.
        code: String,
        /// Human-readable message from the remote error envelope.
        message: String,
    },

    /// Transport-level failure talking to the remote API.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CloudError {
    /// True when the error means the resource is absent remotely.
    ///
    /// Callers use this to distinguish "already gone" from a real failure
    /// when deciding whether a repeated operation already succeeded.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound)
    }
}

/// Result type alias for cloud API operations.
pub type Result<T> = std::result::Result<T, CloudError>;
