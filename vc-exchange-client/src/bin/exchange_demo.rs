use anyhow::{anyhow, Context};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;
use vc_exchange_client::mock::MemoryNetwork;
use vc_exchange_client::{Client, LogLevel};
use vc_exchange_core::claims::{extract_email, CREDENTIAL_TYPE_EMAIL};
use vc_exchange_core::{CredentialDetail, ResponseStatus};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LogLevel::Info.as_filter())
        .init();

    let network = MemoryNetwork::new();
    let issuer = Client::simplified("./issuer_storage", network.engine()).await?;
    let holder = Client::simplified("./holder_storage", network.engine()).await?;
    println!("issuer: {}", issuer.did());
    println!("holder: {}", holder.did());

    let (received_tx, mut received_rx) = mpsc::unbounded_channel();
    holder.credentials().on_credential(move |received| {
        if received_tx.send(received.credential.clone()).is_err() {
            warn!(from = %received.from, "Demo stopped listening for credentials");
        }
    });

    let now = Utc::now();
    issuer
        .credentials()
        .builder()
        .credential_type(CREDENTIAL_TYPE_EMAIL)
        .subject(holder.did())
        .issuer(issuer.did())
        .claim("emailAddress", "alice@example.com")
        .claim("verified", true)
        .valid_from(now)
        .sign_with(issuer.did(), now)
        .issue_and_send()
        .await?;

    let credential = tokio::time::timeout(TIMEOUT, received_rx.recv())
        .await
        .context("holder did not receive the credential")?
        .ok_or_else(|| anyhow!("holder stopped receiving"))?;
    println!("holder received credential {}", credential.id());

    // first request: the holder declines
    holder.credentials().on_presentation_request(|request| {
        println!("holder rejecting request {} from {}", request.request_id(), request.from());
        let request_id = request.request_id().clone();
        if let Err(e) = request.reject() {
            warn!(%request_id, "Could not reject presentation request: {e}");
        }
    });

    let details = vec![CredentialDetail::new(CREDENTIAL_TYPE_EMAIL)];
    let mut pending = issuer
        .credentials()
        .request_presentation_with_timeout(holder.did(), details.clone(), TIMEOUT)
        .await?;
    let response = pending.wait().await?;
    println!("first request {}: {}", response.request_id(), response.status());

    // second request: the holder shares the credential
    let presentation = holder.credentials().present(vec![credential]).await?;
    holder.credentials().on_presentation_request(move |request| {
        println!("holder accepting request {} from {}", request.request_id(), request.from());
        let request_id = request.request_id().clone();
        if let Err(e) = request.accept(vec![presentation.clone()]) {
            warn!(%request_id, "Could not accept presentation request: {e}");
        }
    });

    let mut pending = issuer
        .credentials()
        .request_presentation_with_timeout(holder.did(), details, TIMEOUT)
        .await?;
    let response = pending.wait().await?;
    println!("second request {}: {}", response.request_id(), response.status());

    if response.status() == ResponseStatus::Accepted {
        for presentation in response.presentations() {
            let valid = issuer.credentials().verify_presentation(presentation).await?;
            println!("presentation {} valid: {valid}", presentation.id());
        }
        for email in response.credentials().filter_map(extract_email) {
            println!("shared email: {email}");
        }
    }

    let stats = issuer.stats();
    println!(
        "pending: {}, unknown: {}, duplicate: {}, expired: {}",
        stats.pending, stats.unknown_responses, stats.duplicate_responses, stats.expired
    );

    issuer.shutdown();
    holder.shutdown();
    Ok(())
}
