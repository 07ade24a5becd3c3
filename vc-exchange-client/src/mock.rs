//! In-memory engine for tests, demos and local development.
//!
//! A [`MemoryNetwork`] is a shared directory of identities. Every engine it
//! creates gets a fresh `did:mem:` identity and a random HMAC-SHA256 key, and
//! can reach any other engine of the same network that has connected an inbox.
//!
//! ```rust,no_run
//! use vc_exchange_client::mock::MemoryNetwork;
//! use vc_exchange_client::Client;
//!
//! async fn example() -> vc_exchange_client::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let alice = Client::simplified("./alice_storage", network.engine()).await?;
//!     let bob = Client::simplified("./bob_storage", network.engine()).await?;
//!     assert_ne!(alice.did(), bob.did());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;
use vc_exchange_core::{Engine, Error, Message, Result, Signer, Transport};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

#[derive(Default)]
struct Directory {
    inboxes: HashMap<String, mpsc::Sender<Message>>,
    keys: HashMap<String, Zeroizing<Vec<u8>>>,
}

/// A set of in-memory engines that can message each other.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    directory: Arc<Mutex<Directory>>,
}

impl MemoryNetwork {
    /// Create an empty network
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an engine with a new identity on this network
    #[must_use]
    pub fn engine(&self) -> Arc<MemoryEngine> {
        let identity = format!("did:mem:{}", Uuid::new_v4());
        let mut key = Zeroizing::new(vec![0u8; 32]);
        OsRng.fill_bytes(&mut key);

        self.lock().keys.insert(identity.clone(), key.clone());
        Arc::new(MemoryEngine {
            identity,
            key,
            network: self.clone(),
        })
    }

    /// Stop delivering to `identity`; later sends to it fail
    pub fn disconnect(&self, identity: &str) {
        self.lock().inboxes.remove(identity);
    }
}

/// An engine backed by a [`MemoryNetwork`].
pub struct MemoryEngine {
    identity: String,
    key: Zeroizing<Vec<u8>>,
    network: MemoryNetwork,
}

impl MemoryEngine {
    fn mac(key: &[u8], payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(key).map_err(|e| Error::Signing(e.to_string()))?;
        mac.update(payload);
        Ok(mac)
    }
}

#[async_trait]
impl Transport for MemoryEngine {
    async fn send(&self, to: &str, message: Message) -> Result<()> {
        let inbox = self
            .network
            .lock()
            .inboxes
            .get(to)
            .cloned()
            .ok_or_else(|| Error::SendFailure(format!("no route to {to}")))?;

        trace!(from = %self.identity, %to, message_type = message.typ.as_str(), "Delivering message");
        inbox
            .send(message)
            .await
            .map_err(|_| Error::SendFailure(format!("{to} is no longer receiving")))
    }

    async fn connect(&self, inbox: mpsc::Sender<Message>) -> Result<()> {
        self.network
            .lock()
            .inboxes
            .insert(self.identity.clone(), inbox);
        Ok(())
    }
}

#[async_trait]
impl Signer for MemoryEngine {
    async fn sign(&self, payload: &[u8], signer: &str, _timestamp: DateTime<Utc>) -> Result<Vec<u8>> {
        if signer != self.identity {
            return Err(Error::Signing(format!("no key held for {signer}")));
        }
        Ok(Self::mac(&self.key, payload)?.finalize().into_bytes().to_vec())
    }

    async fn verify(&self, payload: &[u8], signature: &[u8], signer: &str) -> Result<bool> {
        let key = self
            .network
            .lock()
            .keys
            .get(signer)
            .cloned()
            .ok_or_else(|| Error::Verification(format!("unknown signer {signer}")))?;
        Ok(Self::mac(&key, payload)?.verify_slice(signature).is_ok())
    }
}

impl Engine for MemoryEngine {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn transport(&self) -> &dyn Transport {
        self
    }

    fn signer(&self) -> &dyn Signer {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vc_exchange_core::MessageKind;

    #[tokio::test]
    async fn test_signatures_verify_across_engines() {
        let network = MemoryNetwork::new();
        let issuer = network.engine();
        let verifier = network.engine();

        let signature = issuer.sign(b"payload", issuer.identity(), Utc::now()).await.unwrap();
        assert!(verifier.verify(b"payload", &signature, issuer.identity()).await.unwrap());
        assert!(!verifier.verify(b"tampered", &signature, issuer.identity()).await.unwrap());
        assert!(!verifier.verify(b"payload", &signature, verifier.identity()).await.unwrap());
    }

    #[tokio::test]
    async fn test_cannot_sign_for_other_identity() {
        let network = MemoryNetwork::new();
        let engine = network.engine();
        let other = network.engine();

        let result = engine.sign(b"payload", other.identity(), Utc::now()).await;
        assert!(matches!(result, Err(Error::Signing(_))));
        let result = engine.verify(b"payload", b"sig", "did:mem:unknown").await;
        assert!(matches!(result, Err(Error::Verification(_))));
    }

    #[tokio::test]
    async fn test_delivery_requires_connected_inbox() {
        let network = MemoryNetwork::new();
        let sender = network.engine();
        let receiver = network.engine();
        let message = || Message::new(MessageKind::Credential, &serde_json::json!({})).unwrap();

        let result = sender.send(receiver.identity(), message()).await;
        assert!(matches!(result, Err(Error::SendFailure(_))));

        let (inbox, mut messages) = mpsc::channel(1);
        receiver.connect(inbox).await.unwrap();
        sender.send(receiver.identity(), message()).await.unwrap();
        assert!(messages.recv().await.is_some());

        network.disconnect(receiver.identity());
        let result = sender.send(receiver.identity(), message()).await;
        assert!(matches!(result, Err(Error::SendFailure(_))));
    }
}
