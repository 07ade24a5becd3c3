//! Shortcuts for common credential exchanges.

use chrono::Utc;
use std::time::Duration;
use tracing::debug;
use vc_exchange_core::claims::{
    Education, CREDENTIAL_TYPE_EDUCATION, CREDENTIAL_TYPE_EMAIL, CREDENTIAL_TYPE_PROFILE_NAME,
};
use vc_exchange_core::{
    CredentialBuilder, CredentialDetail, CredentialParameter, CredentialResponse, Operator,
    VerifiableCredential,
};

use crate::client::Client;
use crate::error::Result;

/// A builder for `credential_type` about `subject`, issued and signed by
/// `client` as of now.
fn self_issued<const N: usize>(client: &Client, credential_type: [&str; N], subject: &str) -> CredentialBuilder {
    let now = Utc::now();
    client
        .credentials()
        .builder()
        .credential_type(credential_type)
        .subject(subject)
        .issuer(client.did())
        .valid_from(now)
        .sign_with(client.did(), now)
}

/// Issue a verified email credential for `subject`.
///
/// # Errors
///
/// Returns an error if signing fails
pub async fn create_simple_email_credential(
    client: &Client,
    subject: &str,
    email_address: &str,
) -> Result<VerifiableCredential> {
    Ok(self_issued(client, CREDENTIAL_TYPE_EMAIL, subject)
        .claim("emailAddress", email_address)
        .claim("verified", true)
        .issue()
        .await?)
}

/// Issue a profile name credential for `subject`.
///
/// # Errors
///
/// Returns an error if signing fails
pub async fn create_simple_profile_credential(
    client: &Client,
    subject: &str,
    first_name: &str,
    last_name: &str,
    country: &str,
) -> Result<VerifiableCredential> {
    Ok(self_issued(client, CREDENTIAL_TYPE_PROFILE_NAME, subject)
        .claim("firstName", first_name)
        .claim("lastName", last_name)
        .claim("country", country)
        .issue()
        .await?)
}

/// Issue an education credential for `subject`.
///
/// # Errors
///
/// Returns an error if signing fails
pub async fn create_simple_education_credential(
    client: &Client,
    subject: &str,
    education: &Education,
) -> Result<VerifiableCredential> {
    Ok(self_issued(client, CREDENTIAL_TYPE_EDUCATION, subject)
        .claim("degree", education.degree.as_str())
        .claim("institution", education.institution.as_str())
        .claim("graduationYear", education.graduation_year)
        .claim("gpa", education.gpa)
        .issue()
        .await?)
}

/// Ask `responder` for a credential of `credential_type` and wait for the
/// answer.
///
/// The responder's request handler is replaced with one that rejects every
/// request, so this exercises the full round trip without sharing data.
///
/// # Errors
///
/// Returns [`Error::SendFailure`](crate::Error::SendFailure) if the request
/// cannot be sent and [`Error::DeadlineExceeded`](crate::Error::DeadlineExceeded)
/// if no answer arrives within `timeout`
pub async fn quick_credential_exchange<T: AsRef<str>>(
    requester: &Client,
    responder: &Client,
    credential_type: &[T],
    timeout: Duration,
) -> Result<CredentialResponse> {
    responder.credentials().on_presentation_request(|request| {
        let request_id = request.request_id().clone();
        if let Err(e) = request.reject() {
            debug!(%request_id, "Could not reject presentation request: {e}");
        }
    });

    let detail = CredentialDetail::new(credential_type.iter().map(|tag| tag.as_ref().to_string()))
        .parameter(CredentialParameter::new("id", Operator::NotEquals, ""));

    let mut pending = requester
        .credentials()
        .request_presentation_with_timeout(responder.did(), vec![detail], timeout)
        .await?;
    pending.wait().await
}
