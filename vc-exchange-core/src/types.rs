//! Wire envelope and message body definitions.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::credential::{CredentialDetail, ResponseStatus, VerifiableCredential, VerifiablePresentation};
use crate::error::Result;

/// A message type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageType(pub String);

impl MessageType {
    /// Create a new message type
    pub fn new(typ: impl Into<String>) -> Self {
        Self(typ.into())
    }

    /// Get the message type as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Represents a message ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new random message ID
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the message ID as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Correlation identifier shared by a presentation request and its response.
///
/// Generated from a random UUID v4, so identifiers never repeat across
/// client restarts the way a counter would.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Create a new random request ID
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier received from a peer
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the request ID as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The message kinds understood by the exchange workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A peer asks for a presentation
    PresentationRequest,
    /// A peer answers a presentation request
    PresentationResponse,
    /// A peer transmits a freshly issued credential
    Credential,
}

impl MessageKind {
    /// The message type URI carried on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PresentationRequest => "https://vc-exchange.dev/presentation/1.0/request",
            Self::PresentationResponse => "https://vc-exchange.dev/presentation/1.0/response",
            Self::Credential => "https://vc-exchange.dev/credential/1.0/issue",
        }
    }

    /// Map a wire message type back to a kind, if it is one we handle
    #[must_use]
    pub fn from_type(typ: &MessageType) -> Option<Self> {
        [
            Self::PresentationRequest,
            Self::PresentationResponse,
            Self::Credential,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == typ.as_str())
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message exchanged between two identities through the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The message ID
    pub id: MessageId,
    /// The message type
    #[serde(rename = "type")]
    pub typ: MessageType,
    /// The sender's DID
    pub from: Option<String>,
    /// The recipient's DIDs
    pub to: Option<Vec<String>>,
    /// The time the message was created, in unix seconds
    pub created_time: u64,
    /// The time the message expires, in unix seconds
    pub expires_time: Option<u64>,
    /// The message body
    pub body: serde_json::Value,
}

impl Message {
    /// Create a new message of the given kind with a serialized body
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized to JSON
    pub fn new(kind: MessageKind, body: &impl Serialize) -> Result<Self> {
        Ok(Self {
            id: MessageId::random(),
            typ: MessageType::new(kind.as_str()),
            from: None,
            to: None,
            created_time: unix_now(),
            expires_time: None,
            body: serde_json::to_value(body)?,
        })
    }

    /// Set the sender of the message
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the recipients of the message
    #[must_use]
    pub fn to(mut self, to: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.to = Some(to.into_iter().map(Into::into).collect());
        self
    }

    /// Set the expiry relative to the creation time
    #[must_use]
    pub fn expires_in(mut self, ttl: std::time::Duration) -> Self {
        self.expires_time = Some(self.created_time.saturating_add(ttl.as_secs()));
        self
    }

    /// The kind of this message, if it is one the workflow understands
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_type(&self.typ)
    }

    /// Decode the body into a typed payload
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match the payload shape
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// Body of a presentation request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationRequestBody {
    /// The correlation identifier the response must echo
    pub request_id: RequestId,
    /// What is being requested
    pub details: Vec<CredentialDetail>,
}

/// Body of a presentation response message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationResponseBody {
    /// The identifier of the request being answered
    pub request_id: RequestId,
    /// Whether the holder accepted the request
    pub status: ResponseStatus,
    /// The presentations shared by the holder
    #[serde(default)]
    pub presentations: Vec<VerifiablePresentation>,
}

/// Body of a credential delivery message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialBody {
    /// The issued credential
    pub credential: VerifiableCredential,
}
