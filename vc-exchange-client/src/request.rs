//! Inbound presentation requests and the outbound response queue.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use vc_exchange_core::{
    CredentialDetail, Engine, Message, MessageKind, PresentationResponseBody, RequestId,
    ResponseStatus, VerifiablePresentation,
};

use crate::error::{Error, Result};

/// Queue of messages waiting to be handed to the engine.
#[derive(Clone)]
pub(crate) struct Outbound {
    sender: mpsc::UnboundedSender<(String, Message)>,
}

impl Outbound {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<(String, Message)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub(crate) fn push(&self, to: &str, message: Message) -> Result<()> {
        self.sender
            .send((to.to_string(), message))
            .map_err(|_| Error::Closed)
    }
}

/// Drain the outbound queue through the engine until every sender is gone.
pub(crate) fn spawn_outbound(
    engine: Arc<dyn Engine>,
    mut queue: mpsc::UnboundedReceiver<(String, Message)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((to, message)) = queue.recv().await {
            let message_type = message.typ.as_str().to_string();
            match engine.transport().send(&to, message).await {
                Ok(()) => debug!(%to, %message_type, "Sent queued message"),
                Err(e) => error!(%to, %message_type, "Failed to send queued message: {e}"),
            }
        }
        debug!("Outbound queue closed");
    })
}

/// A presentation request received from a peer.
///
/// Answer it with [`accept`](Self::accept) or [`reject`](Self::reject). Both
/// consume the request, so it can be answered at most once. A request that is
/// dropped unanswered is left to time out on the requester's side.
pub struct IncomingCredentialRequest {
    request_id: RequestId,
    from: String,
    details: Vec<CredentialDetail>,
    identity: String,
    outbound: Outbound,
    answered: bool,
}

impl fmt::Debug for IncomingCredentialRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingCredentialRequest")
            .field("request_id", &self.request_id)
            .field("from", &self.from)
            .field("details", &self.details)
            .finish_non_exhaustive()
    }
}

impl IncomingCredentialRequest {
    pub(crate) fn new(
        request_id: RequestId,
        from: String,
        details: Vec<CredentialDetail>,
        identity: String,
        outbound: Outbound,
    ) -> Self {
        Self {
            request_id,
            from,
            details,
            identity,
            outbound,
            answered: false,
        }
    }

    /// The identity asking for a presentation
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    /// The correlation identifier of the request
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// The requested credential constraints
    #[must_use]
    pub fn details(&self) -> &[CredentialDetail] {
        &self.details
    }

    /// The credential type of the first requested detail
    #[must_use]
    pub fn requested_type(&self) -> &[String] {
        self.details
            .first()
            .map(|detail| detail.credential_type.as_slice())
            .unwrap_or_default()
    }

    /// Answer with the given presentations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the client has shut down
    pub fn accept(self, presentations: Vec<VerifiablePresentation>) -> Result<()> {
        self.respond(ResponseStatus::Accepted, presentations)
    }

    /// Decline the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the client has shut down
    pub fn reject(self) -> Result<()> {
        self.respond(ResponseStatus::Rejected, Vec::new())
    }

    fn respond(mut self, status: ResponseStatus, presentations: Vec<VerifiablePresentation>) -> Result<()> {
        self.answered = true;
        let body = PresentationResponseBody {
            request_id: self.request_id.clone(),
            status,
            presentations,
        };
        let message = Message::new(MessageKind::PresentationResponse, &body)?
            .from(self.identity.as_str())
            .to([self.from.as_str()]);

        debug!(request_id = %self.request_id, to = %self.from, %status, "Queueing presentation response");
        self.outbound.push(&self.from, message)
    }
}

impl Drop for IncomingCredentialRequest {
    fn drop(&mut self) {
        if !self.answered {
            warn!(
                request_id = %self.request_id,
                from = %self.from,
                "Presentation request dropped without a response"
            );
        }
    }
}
