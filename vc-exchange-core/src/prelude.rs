//! Prelude module for commonly used types and traits.
//!
//! Import everything from this module with `use vc_exchange_core::prelude::*`.

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export engine traits
pub use crate::plugin::{Engine, Signer, Transport};

// Re-export credential types
pub use crate::credential::{
    ClaimValue, CredentialDetail, CredentialParameter, CredentialResponse, Operator,
    ResponseStatus, VerifiableCredential, VerifiablePresentation,
};

// Re-export message types
pub use crate::types::{Message, MessageKind, RequestId};

// Re-export builder and proof functions
pub use crate::builder::{CredentialBuilder, IssuedCredential};
pub use crate::proof::{sign_presentation, verify_credential, verify_presentation};
