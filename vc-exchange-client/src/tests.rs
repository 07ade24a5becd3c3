use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use vc_exchange_core::{Engine, Message, Result, Signer, Transport};

/// A test engine that records outbound messages and lets tests push inbound
/// ones through the connected inbox.
pub struct RecordingEngine {
    identity: String,
    sent: Mutex<Vec<(String, Message)>>,
    inbox: Mutex<Option<mpsc::Sender<Message>>>,
    connections: AtomicUsize,
}

impl RecordingEngine {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            sent: Mutex::new(Vec::new()),
            inbox: Mutex::new(None),
            connections: AtomicUsize::new(0),
        }
    }

    pub fn sent(&self) -> Vec<(String, Message)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub async fn deliver(&self, message: Message) {
        let inbox = self.inbox.lock().unwrap().clone().expect("engine not connected");
        inbox.send(message).await.unwrap();
    }
}

#[async_trait]
impl Transport for RecordingEngine {
    async fn send(&self, to: &str, message: Message) -> Result<()> {
        self.sent.lock().unwrap().push((to.to_string(), message));
        Ok(())
    }

    async fn connect(&self, inbox: mpsc::Sender<Message>) -> Result<()> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        *self.inbox.lock().unwrap() = Some(inbox);
        Ok(())
    }
}

#[async_trait]
impl Signer for RecordingEngine {
    async fn sign(&self, payload: &[u8], signer: &str, _timestamp: DateTime<Utc>) -> Result<Vec<u8>> {
        let mut input = signer.as_bytes().to_vec();
        input.extend_from_slice(payload);
        Ok(STANDARD.encode(input).into_bytes())
    }

    async fn verify(&self, payload: &[u8], signature: &[u8], signer: &str) -> Result<bool> {
        Ok(self.sign(payload, signer, Utc::now()).await? == signature)
    }
}

impl Engine for RecordingEngine {
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
    use crate::exchange::{create_simple_email_credential, quick_credential_exchange};
    use crate::mock::MemoryNetwork;
    use crate::{Client, ClientConfig, Error};
    use mockall::mock;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use vc_exchange_core::claims::{extract_email, CREDENTIAL_TYPE_EMAIL};
    use vc_exchange_core::{
        CredentialDetail, MessageKind, PresentationResponseBody, RequestId, ResponseStatus,
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn pair(network: &MemoryNetwork) -> (Client, Client) {
        let verifier = Client::simplified("./verifier_storage", network.engine())
            .await
            .unwrap();
        let holder = Client::simplified("./holder_storage", network.engine())
            .await
            .unwrap();
        (verifier, holder)
    }

    fn email_request() -> Vec<CredentialDetail> {
        vec![CredentialDetail::new(CREDENTIAL_TYPE_EMAIL)]
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_request_resolves_before_timeout() {
        let network = MemoryNetwork::new();
        let (verifier, holder) = pair(&network).await;
        holder.credentials().on_presentation_request(|request| {
            request.reject().unwrap();
        });

        let started = Instant::now();
        let mut pending = verifier
            .credentials()
            .request_presentation_with_timeout(holder.did(), email_request(), TIMEOUT)
            .await
            .unwrap();
        let response = pending.wait().await.unwrap();

        assert!(started.elapsed() < TIMEOUT);
        assert_eq!(response.status(), ResponseStatus::Rejected);
        assert_eq!(response.from(), holder.did());
        assert_eq!(response.request_id(), pending.request_id());
        assert_eq!(verifier.stats().pending, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_request_times_out() {
        let network = MemoryNetwork::new();
        let (verifier, holder) = pair(&network).await;

        let started = Instant::now();
        let mut pending = verifier
            .credentials()
            .request_presentation_with_timeout(holder.did(), email_request(), TIMEOUT)
            .await
            .unwrap();
        let result = pending.wait().await;

        let elapsed = started.elapsed();
        assert!(matches!(result, Err(Error::DeadlineExceeded(_))));
        assert!(elapsed >= TIMEOUT && elapsed < TIMEOUT + Duration::from_secs(1));

        // the outcome is recorded
        assert!(matches!(pending.wait().await, Err(Error::DeadlineExceeded(_))));
        assert_eq!(verifier.stats().expired, 1);
    }

    #[tokio::test]
    async fn test_accepted_request_shares_verifiable_presentation() {
        let network = MemoryNetwork::new();
        let (verifier, holder) = pair(&network).await;

        let credential = create_simple_email_credential(&verifier, holder.did(), "alice@example.com")
            .await
            .unwrap();
        let presentation = holder.credentials().present(vec![credential]).await.unwrap();
        holder.credentials().on_presentation_request(move |request| {
            assert_eq!(request.requested_type(), CREDENTIAL_TYPE_EMAIL);
            request.accept(vec![presentation.clone()]).unwrap();
        });

        let mut pending = verifier
            .credentials()
            .request_presentation(holder.did(), email_request())
            .await
            .unwrap();
        let response = pending.wait().await.unwrap();

        assert_eq!(response.status(), ResponseStatus::Accepted);
        let shared = &response.presentations()[0];
        assert_eq!(shared.holder(), holder.did());
        assert!(verifier.credentials().verify_presentation(shared).await.unwrap());

        let emails: Vec<_> = response.credentials().filter_map(extract_email).collect();
        assert_eq!(emails, vec!["alice@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_quick_credential_exchange() {
        let network = MemoryNetwork::new();
        let (verifier, holder) = pair(&network).await;

        let response = quick_credential_exchange(&verifier, &holder, &CREDENTIAL_TYPE_EMAIL, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(response.status(), ResponseStatus::Rejected);
        assert_eq!(response.from(), holder.did());
    }

    #[tokio::test]
    async fn test_issued_credential_reaches_subject() {
        let network = MemoryNetwork::new();
        let (issuer, holder) = pair(&network).await;
        let (received_tx, mut received_rx) = mpsc::unbounded_channel();
        holder.credentials().on_credential(move |received| {
            received_tx.send(received.clone()).unwrap();
        });

        let now = Utc::now();
        let issued = issuer
            .credentials()
            .builder()
            .credential_type(CREDENTIAL_TYPE_EMAIL)
            .subject(holder.did())
            .issuer(issuer.did())
            .claim("emailAddress", "bob@example.com")
            .valid_from(now)
            .sign_with(issuer.did(), now)
            .issue_and_send()
            .await
            .unwrap();

        let received = received_rx.recv().await.unwrap();
        assert_eq!(received.from, issuer.did());
        assert_eq!(&received.credential, issued.credential());
        assert!(holder.credentials().verify_credential(&received.credential).await.unwrap());
    }

    mock! {
        TestTransport {}

        #[async_trait]
        impl Transport for TestTransport {
            async fn send(&self, to: &str, message: Message) -> Result<()>;
            async fn connect(&self, inbox: mpsc::Sender<Message>) -> Result<()>;
            async fn ready(&self) -> Result<()>;
        }
    }

    struct UnreachableEngine {
        transport: MockTestTransport,
        signer: RecordingEngine,
    }

    impl Engine for UnreachableEngine {
        fn identity(&self) -> &str {
            "did:example:verifier"
        }

        fn transport(&self) -> &dyn Transport {
            &self.transport
        }

        fn signer(&self) -> &dyn Signer {
            &self.signer
        }
    }

    #[tokio::test]
    async fn test_send_failure_leaves_nothing_pending() {
        let mut transport = MockTestTransport::new();
        transport.expect_ready().returning(|| Ok(()));
        transport.expect_connect().times(1).returning(|_| Ok(()));
        transport.expect_send().returning(|to, _| {
            Err(vc_exchange_core::Error::SendFailure(format!("{to} is unreachable")))
        });
        let engine = Arc::new(UnreachableEngine {
            transport,
            signer: RecordingEngine::new("did:example:verifier"),
        });

        let client = Client::new(ClientConfig::simplified("./verifier_storage"), engine)
            .await
            .unwrap();
        let result = client
            .credentials()
            .request_presentation("did:example:holder", email_request())
            .await;

        match result {
            Err(Error::SendFailure(reason)) => assert_eq!(reason, "did:example:holder is unreachable"),
            other => panic!("expected send failure, got {other:?}"),
        }
        assert_eq!(client.stats().pending, 0);
    }

    #[tokio::test]
    async fn test_engine_errors_other_than_send_are_not_rewrapped() {
        let mut transport = MockTestTransport::new();
        transport.expect_ready().returning(|| Ok(()));
        transport.expect_connect().times(1).returning(|_| Ok(()));
        transport
            .expect_send()
            .returning(|_, _| Err(vc_exchange_core::Error::Signing("envelope key unavailable".to_string())));
        let engine = Arc::new(UnreachableEngine {
            transport,
            signer: RecordingEngine::new("did:example:verifier"),
        });

        let client = Client::new(ClientConfig::simplified("./verifier_storage"), engine)
            .await
            .unwrap();
        let result = client
            .credentials()
            .request_presentation("did:example:holder", email_request())
            .await;

        match result {
            Err(Error::Core(vc_exchange_core::Error::Signing(reason))) => {
                assert_eq!(reason, "envelope key unavailable");
            }
            other => panic!("expected signing error, got {other:?}"),
        }
        assert_eq!(client.stats().pending, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let network = MemoryNetwork::new();
        let (verifier, holder) = pair(&network).await;
        holder.credentials().on_presentation_request(|request| {
            request.reject().unwrap();
        });

        let requests = (0..8).map(|_| async {
            let mut pending = verifier
                .credentials()
                .request_presentation_with_timeout(holder.did(), email_request(), TIMEOUT)
                .await?;
            let response = pending.wait().await?;
            assert_eq!(response.request_id(), pending.request_id());
            Ok::<_, Error>(response.request_id().clone())
        });
        let mut ids: Vec<RequestId> = futures::future::try_join_all(requests).await.unwrap();

        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(verifier.stats().pending, 0);
    }

    fn response_from(from: &str, request_id: &RequestId) -> Message {
        let body = PresentationResponseBody {
            request_id: request_id.clone(),
            status: ResponseStatus::Accepted,
            presentations: Vec::new(),
        };
        Message::new(MessageKind::PresentationResponse, &body)
            .unwrap()
            .from(from)
    }

    #[tokio::test]
    async fn test_anomalies_are_counted_and_delivery_survives() {
        let engine = Arc::new(RecordingEngine::new("did:example:verifier"));
        let client = Client::new(ClientConfig::simplified("./verifier_storage"), engine.clone())
            .await
            .unwrap();
        let holder = "did:example:holder";

        let mut first = client
            .credentials()
            .request_presentation(holder, email_request())
            .await
            .unwrap();
        engine.deliver(response_from(holder, first.request_id())).await;
        assert_eq!(first.wait().await.unwrap().status(), ResponseStatus::Accepted);

        // settled, unknown and spoofed
        engine.deliver(response_from(holder, first.request_id())).await;
        engine.deliver(response_from(holder, &RequestId::random())).await;
        let mut second = client
            .credentials()
            .request_presentation(holder, email_request())
            .await
            .unwrap();
        engine.deliver(response_from("did:example:mallory", second.request_id())).await;

        engine.deliver(response_from(holder, second.request_id())).await;
        let response = second.wait().await.unwrap();
        assert_eq!(response.from(), holder);

        let stats = client.stats();
        assert_eq!(stats.duplicate_responses, 1);
        assert_eq!(stats.unknown_responses, 2);
        assert_eq!(stats.pending, 0);
    }
}
