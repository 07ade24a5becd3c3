//! Core credential model for the vc-exchange workflow.
//!
//! This crate provides the pieces of a credential exchange that do not depend
//! on a running client: the wire envelope, the verifiable credential data
//! model, the fluent credential builder, proof handling, and the interface to
//! the identity and messaging engine.
//!
//! # Features
//!
//! - Immutable credentials and presentations with typed claim values
//! - A fluent [`CredentialBuilder`] validated only at its terminal call
//! - Presentation request constraints ([`CredentialDetail`]) that can be
//!   evaluated against held credentials
//! - Typed claim extraction for well-known credential types
//! - An engine trait family ([`Engine`], [`Transport`], [`Signer`]) so
//!   cryptography and transport stay outside this crate
//!
//! # Architecture
//!
//! The crate is organized into these main modules:
//! - `types`: Wire envelope and message bodies
//! - `credential`: Credentials, presentations, requests and responses
//! - `builder`: Credential construction and issuance
//! - `proof`: Signing input and proof checking
//! - `claims`: Well-known types and claim extraction
//! - `plugin`: The engine interface
//! - `error`: Error types and handling
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use vc_exchange_core::{claims, CredentialBuilder, Engine};
//!
//! async fn example(engine: Arc<dyn Engine>, holder: &str) -> vc_exchange_core::Result<()> {
//!     let issuer = engine.identity().to_string();
//!     let credential = CredentialBuilder::new(engine)
//!         .credential_type(claims::CREDENTIAL_TYPE_EMAIL)
//!         .subject(holder)
//!         .issuer(&issuer)
//!         .claim("emailAddress", "alice@example.com")
//!         .valid_from(Utc::now())
//!         .sign_with(&issuer, Utc::now())
//!         .issue()
//!         .await?;
//!
//!     assert_eq!(claims::extract_email(&credential).as_deref(), Some("alice@example.com"));
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod claims;
pub mod credential;
pub mod error;
pub mod plugin;
pub mod prelude;
pub mod proof;
pub mod types;


pub use builder::{CredentialBuilder, IssuedCredential};
pub use credential::{
    same_type, ClaimValue, CredentialDetail, CredentialParameter, CredentialResponse, Operator,
    Proof, ResponseStatus, VerifiableCredential, VerifiablePresentation,
};
pub use error::{Error, Result};
pub use plugin::{Engine, Signer, Transport};
pub use proof::{sign_presentation, verify_credential, verify_presentation};
pub use types::{
    CredentialBody, Message, MessageId, MessageKind, MessageType, PresentationRequestBody,
    PresentationResponseBody, RequestId,
};
