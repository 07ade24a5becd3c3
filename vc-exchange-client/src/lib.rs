//! Credential exchange client built on vc-exchange-core.
//!
//! This crate turns an identity and messaging engine into a client that can:
//! - Issue credentials and send them to their subjects
//! - Ask peers for presentations and wait for the matching response
//! - Answer presentation requests from peers through registered handlers
//! - Verify shared credentials and presentations
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//! - `client`: The client, its background tasks and the credential facade
//! - `correlator`: Matching of responses to outstanding requests
//! - `registry`: Per-client handler registration
//! - `request`: Inbound presentation requests and the response queue
//! - `dispatch`: Routing of inbound messages
//! - `exchange`: Shortcuts for common exchanges
//! - `config`: Client configuration
//! - `mock`: An in-memory engine for tests and demos
//! - `error`: Error types and handling
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use vc_exchange_client::exchange::quick_credential_exchange;
//! use vc_exchange_client::mock::MemoryNetwork;
//! use vc_exchange_client::Client;
//! use vc_exchange_core::claims::CREDENTIAL_TYPE_EMAIL;
//!
//! async fn example() -> vc_exchange_client::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let verifier = Client::simplified("./verifier_storage", network.engine()).await?;
//!     let holder = Client::simplified("./holder_storage", network.engine()).await?;
//!
//!     let response =
//!         quick_credential_exchange(&verifier, &holder, &CREDENTIAL_TYPE_EMAIL, Duration::from_secs(5))
//!             .await?;
//!     println!("holder answered: {}", response.status());
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod correlator;
mod dispatch;
pub mod error;
pub mod exchange;
pub mod mock;
pub mod registry;
pub mod request;

#[cfg(test)]
pub(crate) mod tests;

// Re-export main types for convenience
pub use client::{Client, Credentials};
pub use config::{ClientConfig, Environment, ExchangeConfig, LogLevel, StorageKey, Target};
pub use correlator::{CorrelatorStats, PendingPresentation, RequestState};
pub use error::{Error, Result};
pub use registry::{EventKind, ReceivedCredential};
pub use request::IncomingCredentialRequest;
