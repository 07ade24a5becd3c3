//! Engine interface for identity and messaging operations.
//!
//! The exchange workflow never touches keys or sockets itself. Everything it
//! needs from the identity engine goes through the traits in this module:
//! - [`Transport`]: sending messages and handing inbound messages to a client
//! - [`Signer`]: producing and checking signatures for an identity
//! - [`Engine`]: the combined interface, plus the engine's own identity
//!
//! # Examples
//!
//! ```rust,no_run
//! use vc_exchange_core::plugin::Engine;
//! use vc_exchange_core::{Message, MessageKind};
//!
//! async fn ping(engine: &dyn Engine, to: &str) -> vc_exchange_core::Result<()> {
//!     let message = Message::new(MessageKind::Credential, &serde_json::json!({}))?
//!         .from(engine.identity())
//!         .to([to]);
//!     engine.transport().send(to, message).await
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::{Message, Result};

/// Delivers messages between identities.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a message to the target identity.
    ///
    /// # Errors
    /// - If the target cannot be reached
    /// - If the channel to the target is closed
    async fn send(&self, to: &str, message: Message) -> Result<()>;

    /// Registers the inbox the engine's delivery path pushes inbound
    /// messages into. Messages must be pushed in arrival order.
    ///
    /// # Errors
    /// - If the engine cannot accept an inbox
    async fn connect(&self, inbox: mpsc::Sender<Message>) -> Result<()>;

    /// Resolves once the engine is able to send and receive.
    ///
    /// # Errors
    /// - If the engine failed to come up
    async fn ready(&self) -> Result<()> {
        Ok(())
    }
}

/// Signs and verifies payloads on behalf of identities.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs a payload with the key of `signer`.
    ///
    /// # Arguments
    /// * `payload` - The bytes to sign
    /// * `signer` - The signing identity
    /// * `timestamp` - The signing time recorded in the proof
    ///
    /// # Errors
    /// - If the engine holds no key for `signer`
    /// - If signing fails
    async fn sign(&self, payload: &[u8], signer: &str, timestamp: DateTime<Utc>)
        -> Result<Vec<u8>>;

    /// Verifies a signature produced by `signer`.
    ///
    /// # Errors
    /// - If the signer's key cannot be resolved
    async fn verify(&self, payload: &[u8], signature: &[u8], signer: &str) -> Result<bool>;
}

/// Combined interface to the identity and messaging engine.
pub trait Engine: Send + Sync {
    /// The identity this engine acts as.
    fn identity(&self) -> &str;

    /// Gets the transport implementation.
    fn transport(&self) -> &dyn Transport;

    /// Gets the signer implementation.
    fn signer(&self) -> &dyn Signer;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        TestSigner {}

        #[async_trait]
        impl Signer for TestSigner {
            async fn sign(&self, payload: &[u8], signer: &str, timestamp: DateTime<Utc>) -> Result<Vec<u8>>;
            async fn verify(&self, payload: &[u8], signature: &[u8], signer: &str) -> Result<bool>;
        }
    }

    #[tokio::test]
    async fn test_signer_mock() {
        let mut signer = MockTestSigner::new();
        let payload = b"test payload";
        let signature = b"test signature";
        let key = "did:example:123";

        signer
            .expect_sign()
            .with(eq(payload.as_ref()), eq(key), always())
            .returning(|_, _, _| Ok(b"test signature".to_vec()));

        signer
            .expect_verify()
            .with(eq(payload.as_ref()), eq(signature.as_ref()), eq(key))
            .returning(|_, _, _| Ok(true));

        let produced = signer.sign(payload, key, Utc::now()).await.unwrap();
        assert_eq!(produced, signature);

        let valid = signer.verify(payload, signature, key).await.unwrap();
        assert!(valid);
    }
}
