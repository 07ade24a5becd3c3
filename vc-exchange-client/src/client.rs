//! The exchange client.
//!
//! A [`Client`] binds one engine identity to a correlator, a handler registry
//! and three background tasks:
//! - delivery: drains the engine's inbox and routes inbound messages
//! - outbound: sends responses queued by request handlers
//! - sweeper: expires unattended requests and forgets settled ones
//!
//! All credential operations are reached through [`Client::credentials`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use vc_exchange_client::mock::MemoryNetwork;
//! use vc_exchange_client::Client;
//! use vc_exchange_core::{claims, CredentialDetail};
//!
//! async fn example() -> vc_exchange_client::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let verifier = Client::simplified("./verifier_storage", network.engine()).await?;
//!     let holder = Client::simplified("./holder_storage", network.engine()).await?;
//!
//!     holder.credentials().on_presentation_request(|request| {
//!         let _ = request.reject();
//!     });
//!
//!     let mut pending = verifier
//!         .credentials()
//!         .request_presentation_with_timeout(
//!             holder.did(),
//!             vec![CredentialDetail::new(claims::CREDENTIAL_TYPE_EMAIL)],
//!             Duration::from_secs(5),
//!         )
//!         .await?;
//!     let response = pending.wait().await?;
//!     println!("{} answered {}", response.from(), response.status());
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vc_exchange_core::{
    proof, CredentialBuilder, CredentialDetail, Engine, Message, MessageKind,
    PresentationRequestBody, VerifiableCredential, VerifiablePresentation,
};

use crate::config::ClientConfig;
use crate::correlator::{spawn_sweeper, Correlator, CorrelatorStats, PendingPresentation};
use crate::dispatch::{spawn_delivery, Dispatcher};
use crate::error::{Error, Result};
use crate::registry::{HandlerRegistry, ReceivedCredential};
use crate::request::{spawn_outbound, IncomingCredentialRequest, Outbound};

/// A credential exchange client acting as one engine identity.
pub struct Client {
    config: ClientConfig,
    engine: Arc<dyn Engine>,
    correlator: Arc<Correlator>,
    registry: Arc<HandlerRegistry>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("did", &self.did())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client and start its background tasks.
    ///
    /// Unless disabled in the configuration, waits for the engine to become
    /// ready and connects the inbound delivery path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the engine fails
    /// to come up
    pub async fn new(config: ClientConfig, engine: Arc<dyn Engine>) -> Result<Self> {
        config.validate()?;

        if config.skip_ready {
            debug!("Skipping engine readiness check");
        } else {
            engine.transport().ready().await?;
        }

        let correlator = Arc::new(Correlator::new(config.exchange.grace_period));
        let registry = Arc::new(HandlerRegistry::new());
        let (outbound, queue) = Outbound::new();

        let mut tasks = vec![
            spawn_outbound(engine.clone(), queue),
            spawn_sweeper(Arc::downgrade(&correlator), config.exchange.sweep_interval),
        ];

        if config.skip_setup {
            debug!("Skipping inbound delivery setup");
        } else {
            let (inbox, messages) = mpsc::channel(config.exchange.inbox_capacity);
            engine.transport().connect(inbox).await?;
            let dispatcher = Dispatcher::new(
                engine.clone(),
                correlator.clone(),
                registry.clone(),
                outbound.clone(),
            );
            tasks.push(spawn_delivery(dispatcher, messages));
        }

        info!(
            did = engine.identity(),
            environment = ?config.environment,
            "Client started"
        );

        Ok(Self {
            config,
            engine,
            correlator,
            registry,
            tasks: Mutex::new(tasks),
        })
    }

    /// Create a client with development defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to come up
    pub async fn simplified(storage_path: impl Into<PathBuf>, engine: Arc<dyn Engine>) -> Result<Self> {
        Self::new(ClientConfig::simplified(storage_path), engine).await
    }

    /// Create a client with production defaults and an explicit storage key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not 32 bytes, the storage directory
    /// cannot be created, or the engine fails to come up
    pub async fn simplified_with_key(
        storage_key: &[u8],
        storage_path: impl Into<PathBuf>,
        engine: Arc<dyn Engine>,
    ) -> Result<Self> {
        Self::new(ClientConfig::simplified_with_key(storage_key, storage_path)?, engine).await
    }

    /// The identity this client acts as
    #[must_use]
    pub fn did(&self) -> &str {
        self.engine.identity()
    }

    /// The configuration the client was created with
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Credential operations
    #[must_use]
    pub fn credentials(&self) -> Credentials<'_> {
        Credentials { client: self }
    }

    /// Correlator counters
    #[must_use]
    pub fn stats(&self) -> CorrelatorStats {
        self.correlator.stats()
    }

    /// Stop the background tasks. Pending requests still time out; queued
    /// responses that were not sent yet are dropped.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            task.abort();
        }
        info!(did = self.did(), "Client stopped");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Credential operations of a [`Client`].
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    client: &'a Client,
}

impl Credentials<'_> {
    /// Start a credential issued by this client's engine
    #[must_use]
    pub fn builder(&self) -> CredentialBuilder {
        CredentialBuilder::new(self.client.engine.clone())
    }

    /// Ask `target` for a presentation using the configured default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SendFailure`] if the request cannot be transmitted
    pub async fn request_presentation(
        &self,
        target: &str,
        details: Vec<CredentialDetail>,
    ) -> Result<PendingPresentation> {
        let timeout = self.client.config.exchange.default_timeout;
        self.request_presentation_with_timeout(target, details, timeout).await
    }

    /// Ask `target` for a presentation that expires after `timeout`.
    ///
    /// The request is registered before it is transmitted, so a response that
    /// arrives immediately is still matched. If transmission fails the request
    /// is forgotten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SendFailure`] if the engine cannot transmit the
    /// request. Any other engine error is returned as [`Error::Core`].
    pub async fn request_presentation_with_timeout(
        &self,
        target: &str,
        details: Vec<CredentialDetail>,
        timeout: Duration,
    ) -> Result<PendingPresentation> {
        let client = self.client;
        let pending = client.correlator.register(target, details.clone(), timeout);
        let body = PresentationRequestBody {
            request_id: pending.request_id().clone(),
            details,
        };

        if let Err(e) = self.transmit(target, &body, timeout).await {
            client.correlator.remove(pending.request_id());
            return Err(Error::from(e));
        }

        debug!(request_id = %pending.request_id(), target, "Sent presentation request");
        Ok(pending)
    }

    async fn transmit(
        &self,
        target: &str,
        body: &PresentationRequestBody,
        timeout: Duration,
    ) -> vc_exchange_core::Result<()> {
        let message = Message::new(MessageKind::PresentationRequest, body)?
            .from(self.client.did())
            .to([target])
            .expires_in(timeout);
        self.client.engine.transport().send(target, message).await
    }

    /// Handle presentation requests from peers, replacing any previous handler
    ///
    /// Handlers run on the delivery task and should return promptly. A
    /// panicking handler is logged and does not stop delivery.
    pub fn on_presentation_request<F>(&self, handler: F)
    where
        F: Fn(IncomingCredentialRequest) + Send + Sync + 'static,
    {
        self.client.registry.set_request_handler(handler);
    }

    /// Observe matched presentation responses, replacing any previous handler
    pub fn on_presentation_response<F>(&self, handler: F)
    where
        F: Fn(&vc_exchange_core::CredentialResponse) + Send + Sync + 'static,
    {
        self.client.registry.set_response_handler(handler);
    }

    /// Handle credentials sent to this client, replacing any previous handler
    pub fn on_credential<F>(&self, handler: F)
    where
        F: Fn(&ReceivedCredential) + Send + Sync + 'static,
    {
        self.client.registry.set_credential_handler(handler);
    }

    /// Bundle credentials into a presentation signed as this client.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails
    pub async fn present(&self, credentials: Vec<VerifiableCredential>) -> Result<VerifiablePresentation> {
        Ok(proof::sign_presentation(self.client.engine.as_ref(), credentials).await?)
    }

    /// Check a credential's issuer proof.
    ///
    /// # Errors
    ///
    /// Returns an error if the proof cannot be decoded or the issuer cannot
    /// be resolved
    pub async fn verify_credential(&self, credential: &VerifiableCredential) -> Result<bool> {
        Ok(proof::verify_credential(self.client.engine.signer(), credential).await?)
    }

    /// Check a presentation's holder proof and every credential inside it.
    ///
    /// # Errors
    ///
    /// Returns an error if a proof cannot be decoded or a signer cannot be
    /// resolved
    pub async fn verify_presentation(&self, presentation: &VerifiablePresentation) -> Result<bool> {
        Ok(proof::verify_presentation(self.client.engine.signer(), presentation).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageKey;
    use crate::tests::RecordingEngine;
    use pretty_assertions::assert_eq;

    fn config() -> ClientConfig {
        ClientConfig {
            storage_key: StorageKey::generate(),
            storage_path: PathBuf::from("./client_test_storage"),
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let engine = Arc::new(RecordingEngine::new("did:example:verifier"));
        let result = Client::new(ClientConfig::default(), engine).await;
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_skip_setup_does_not_connect() {
        let engine = Arc::new(RecordingEngine::new("did:example:verifier"));
        let client = Client::new(
            ClientConfig {
                skip_setup: true,
                skip_ready: true,
                ..config()
            },
            engine.clone(),
        )
        .await
        .unwrap();

        assert_eq!(client.did(), "did:example:verifier");
        assert_eq!(engine.connections(), 0);
    }

    #[tokio::test]
    async fn test_request_is_transmitted_with_request_id() {
        let engine = Arc::new(RecordingEngine::new("did:example:verifier"));
        let client = Client::new(config(), engine.clone()).await.unwrap();
        assert_eq!(engine.connections(), 1);

        let details = vec![CredentialDetail::new(vc_exchange_core::claims::CREDENTIAL_TYPE_EMAIL)];
        let pending = client
            .credentials()
            .request_presentation("did:example:holder", details.clone())
            .await
            .unwrap();

        let sent = engine.sent();
        assert_eq!(sent.len(), 1);
        let (to, message) = &sent[0];
        assert_eq!(to, "did:example:holder");
        assert_eq!(message.kind(), Some(MessageKind::PresentationRequest));
        assert_eq!(message.from.as_deref(), Some("did:example:verifier"));

        let body: PresentationRequestBody = message.body_as().unwrap();
        assert_eq!(&body.request_id, pending.request_id());
        assert_eq!(body.details, details);
        assert_eq!(client.stats().pending, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_tasks() {
        let engine = Arc::new(RecordingEngine::new("did:example:holder"));
        let client = Client::new(config(), engine).await.unwrap();
        assert_eq!(client.tasks.lock().unwrap().len(), 3);

        client.shutdown();
        assert!(client.tasks.lock().unwrap().is_empty());
        client.shutdown();
    }
}
