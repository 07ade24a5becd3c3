//! Error types for the vc-exchange-core crate.

use thiserror::Error;

/// Error type for the credential core library
#[derive(Debug, Error)]
pub enum Error {
    /// Base64 decode error
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    /// A builder terminal was called before a required field was set
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),
    /// Serialization error
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    /// Signing error
    #[error("Signing error: {0}")]
    Signing(String),
    /// Verification error
    #[error("Verification error: {0}")]
    Verification(String),
    /// The engine failed to transmit a message
    #[error("Send failure: {0}")]
    SendFailure(String),
}

/// Result type for the credential core library
pub type Result<T> = std::result::Result<T, Error>;
