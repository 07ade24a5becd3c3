//! Per-client handler registration.
//!
//! Each client owns one registry with a single slot per event kind. A new
//! registration replaces the previous one. Handlers are cloned out of their
//! slot before being invoked, so a handler may re-register itself or another
//! handler without deadlocking the delivery task.
//!
//! Handlers run on the delivery task. A handler that panics is logged at
//! error level and the message it was handling is dropped; delivery of later
//! messages continues.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;
use vc_exchange_core::{CredentialResponse, VerifiableCredential};

use crate::request::IncomingCredentialRequest;

/// Callback for inbound presentation requests.
pub type RequestHandler = Arc<dyn Fn(IncomingCredentialRequest) + Send + Sync>;

/// Callback for matched presentation responses.
pub type ResponseHandler = Arc<dyn Fn(&CredentialResponse) + Send + Sync>;

/// Callback for credentials received from an issuer.
pub type CredentialHandler = Arc<dyn Fn(&ReceivedCredential) + Send + Sync>;

/// A credential transmitted to this client.
#[derive(Debug, Clone)]
pub struct ReceivedCredential {
    /// The sending identity
    pub from: String,
    /// The credential itself
    pub credential: VerifiableCredential,
}

/// The kinds of inbound events a handler can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A peer asked for a presentation
    PresentationRequest,
    /// A peer answered one of our requests
    PresentationResponse,
    /// A peer sent us a credential
    Credential,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PresentationRequest => "presentation_request",
            Self::PresentationResponse => "presentation_response",
            Self::Credential => "credential",
        })
    }
}

type Slot<T> = RwLock<Option<T>>;

fn load<T: Clone>(slot: &Slot<T>) -> Option<T> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn store<T>(slot: &Slot<T>, handler: T, kind: EventKind) {
    let replaced = slot
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(handler)
        .is_some();
    info!(%kind, replaced, "Registered handler");
}

/// Registry of message handlers, one per [`EventKind`].
#[derive(Default)]
pub struct HandlerRegistry {
    on_request: Slot<RequestHandler>,
    on_response: Slot<ResponseHandler>,
    on_credential: Slot<CredentialHandler>,
}

impl HandlerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the presentation request handler
    pub fn set_request_handler<F>(&self, handler: F)
    where
        F: Fn(IncomingCredentialRequest) + Send + Sync + 'static,
    {
        let handler: RequestHandler = Arc::new(handler);
        store(&self.on_request, handler, EventKind::PresentationRequest);
    }

    /// Replace the presentation response handler
    pub fn set_response_handler<F>(&self, handler: F)
    where
        F: Fn(&CredentialResponse) + Send + Sync + 'static,
    {
        let handler: ResponseHandler = Arc::new(handler);
        store(&self.on_response, handler, EventKind::PresentationResponse);
    }

    /// Replace the credential handler
    pub fn set_credential_handler<F>(&self, handler: F)
    where
        F: Fn(&ReceivedCredential) + Send + Sync + 'static,
    {
        let handler: CredentialHandler = Arc::new(handler);
        store(&self.on_credential, handler, EventKind::Credential);
    }

    /// The current presentation request handler
    #[must_use]
    pub fn request_handler(&self) -> Option<RequestHandler> {
        load(&self.on_request)
    }

    /// The current presentation response handler
    #[must_use]
    pub fn response_handler(&self) -> Option<ResponseHandler> {
        load(&self.on_response)
    }

    /// The current credential handler
    #[must_use]
    pub fn credential_handler(&self) -> Option<CredentialHandler> {
        load(&self.on_credential)
    }

    /// Whether a handler is registered for `kind`
    #[must_use]
    pub fn is_registered(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::PresentationRequest => self.request_handler().is_some(),
            EventKind::PresentationResponse => self.response_handler().is_some(),
            EventKind::Credential => self.credential_handler().is_some(),
        }
    }
}
