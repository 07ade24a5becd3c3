//! Error types for the vc-exchange-client crate.

use thiserror::Error;
use vc_exchange_core::RequestId;

/// The main error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the core crate.
    #[error("Core error: {0}")]
    Core(vc_exchange_core::Error),

    /// A builder terminal was called before a required field was set.
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// Key material has the wrong size.
    #[error("storage key must be exactly {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// The required length in bytes
        expected: usize,
        /// The supplied length in bytes
        actual: usize,
    },

    /// No response arrived before the request's deadline.
    #[error("Presentation request {0} timed out")]
    DeadlineExceeded(RequestId),

    /// The caller cancelled the wait.
    #[error("Presentation request {0} was cancelled")]
    Cancelled(RequestId),

    /// The engine could not transmit a message.
    #[error("Send failure: {0}")]
    SendFailure(String),

    /// A response arrived for a request that is already settled.
    #[error("Duplicate response for request {0}")]
    DuplicateResponse(RequestId),

    /// A response arrived for a request that is not pending here.
    #[error("Response for unknown request {0}")]
    UnknownRequest(RequestId),

    /// The client configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The client's background tasks have stopped.
    #[error("Client is closed")]
    Closed,

    /// An error occurred while preparing local storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<vc_exchange_core::Error> for Error {
    fn from(error: vc_exchange_core::Error) -> Self {
        match error {
            vc_exchange_core::Error::MissingRequiredField(field) => Self::MissingRequiredField(field),
            vc_exchange_core::Error::SendFailure(reason) => Self::SendFailure(reason),
            other => Self::Core(other),
        }
    }
}

/// A specialized Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
