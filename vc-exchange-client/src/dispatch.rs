//! Routing of inbound messages.
//!
//! The engine pushes every inbound message into the client's inbox. A single
//! delivery task drains the inbox in arrival order and routes each message by
//! its [`MessageKind`]:
//!
//! - presentation requests go to the registered request handler
//! - presentation responses go to the correlator, then to the response handler
//! - credentials go to the credential handler
//!
//! Malformed or unknown messages are logged and skipped. Nothing a peer sends
//! can stop the delivery task, and a panicking handler is logged and skipped
//! like a malformed message.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vc_exchange_core::{
    CredentialBody, CredentialResponse, Engine, Message, MessageKind, PresentationRequestBody,
    PresentationResponseBody,
};

use crate::correlator::{record_anomaly, Correlator};
use crate::registry::{HandlerRegistry, ReceivedCredential};
use crate::request::{IncomingCredentialRequest, Outbound};

/// Routes inbound messages to the correlator and the handler registry.
pub(crate) struct Dispatcher {
    engine: Arc<dyn Engine>,
    correlator: Arc<Correlator>,
    registry: Arc<HandlerRegistry>,
    outbound: Outbound,
}

impl Dispatcher {
    pub(crate) fn new(
        engine: Arc<dyn Engine>,
        correlator: Arc<Correlator>,
        registry: Arc<HandlerRegistry>,
        outbound: Outbound,
    ) -> Self {
        Self {
            engine,
            correlator,
            registry,
            outbound,
        }
    }

    /// Route one inbound message.
    pub(crate) fn dispatch(&self, message: Message) {
        let Some(from) = message.from.clone() else {
            warn!(message_id = message.id.as_str(), "Dropping message without sender");
            return;
        };

        match message.kind() {
            Some(MessageKind::PresentationRequest) => self.on_request(&from, &message),
            Some(MessageKind::PresentationResponse) => self.on_response(&from, &message),
            Some(MessageKind::Credential) => self.on_credential(&from, &message),
            None => {
                debug!(%from, message_type = message.typ.as_str(), "Ignoring unsupported message");
            }
        }
    }

    fn on_request(&self, from: &str, message: &Message) {
        let body: PresentationRequestBody = match message.body_as() {
            Ok(body) => body,
            Err(e) => {
                warn!(%from, "Malformed presentation request: {e}");
                return;
            }
        };

        let Some(handler) = self.registry.request_handler() else {
            info!(request_id = %body.request_id, %from, "No handler for presentation request");
            return;
        };

        debug!(request_id = %body.request_id, %from, "Received presentation request");
        let request = IncomingCredentialRequest::new(
            body.request_id,
            from.to_string(),
            body.details,
            self.engine.identity().to_string(),
            self.outbound.clone(),
        );
        run_handler(MessageKind::PresentationRequest, from, || handler(request));
    }

    fn on_response(&self, from: &str, message: &Message) {
        let body: PresentationResponseBody = match message.body_as() {
            Ok(body) => body,
            Err(e) => {
                warn!(%from, "Malformed presentation response: {e}");
                return;
            }
        };

        let response = CredentialResponse::new(body.request_id, from, body.status, body.presentations);
        if let Err(e) = self.correlator.deliver(response.clone()) {
            record_anomaly(&e);
            return;
        }

        if let Some(handler) = self.registry.response_handler() {
            run_handler(MessageKind::PresentationResponse, from, || handler(&response));
        }
    }

    fn on_credential(&self, from: &str, message: &Message) {
        let body: CredentialBody = match message.body_as() {
            Ok(body) => body,
            Err(e) => {
                warn!(%from, "Malformed credential: {e}");
                return;
            }
        };

        let received = ReceivedCredential {
            from: from.to_string(),
            credential: body.credential,
        };
        match self.registry.credential_handler() {
            Some(handler) => run_handler(MessageKind::Credential, from, || handler(&received)),
            None => info!(
                %from,
                credential = received.credential.id(),
                "No handler for received credential"
            ),
        }
    }
}

/// Invoke a user handler, containing any panic so delivery continues.
fn run_handler(kind: MessageKind, from: &str, handler: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(handler)) {
        error!(%from, ?kind, "Handler panicked: {}", panic_message(panic.as_ref()));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Start the delivery task. It ends when the engine drops its inbox sender.
pub(crate) fn spawn_delivery(
    dispatcher: Dispatcher,
    mut inbox: mpsc::Receiver<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            dispatcher.dispatch(message);
        }
        debug!("Inbox closed, delivery stopped");
    })
}
