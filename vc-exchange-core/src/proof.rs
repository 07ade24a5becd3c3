//! Proof creation and checking for credentials and presentations.
//!
//! The signing input is the JSON serialization of the unsigned document
//! together with the proof's verification method and creation time, so a
//! proof cannot be moved to a different document or re-dated.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::{
    credential::{
        Proof, UnsignedCredential, UnsignedPresentation, VerifiableCredential,
        VerifiablePresentation, VERIFIABLE_PRESENTATION,
    },
    error::Result,
    plugin::{Engine, Signer},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigningInput<'a, T> {
    document: &'a T,
    verification_method: &'a str,
    created: DateTime<Utc>,
}

fn signing_input<T: Serialize>(
    document: &T,
    verification_method: &str,
    created: DateTime<Utc>,
) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&SigningInput {
        document,
        verification_method,
        created,
    })?)
}

async fn create_proof<T: Serialize + Sync>(
    signer: &dyn Signer,
    document: &T,
    verification_method: &str,
    created: DateTime<Utc>,
) -> Result<Proof> {
    let payload = signing_input(document, verification_method, created)?;
    let signature = signer.sign(&payload, verification_method, created).await?;

    Ok(Proof {
        verification_method: verification_method.to_string(),
        created,
        proof_value: URL_SAFE_NO_PAD.encode(signature),
    })
}

async fn check_proof<T: Serialize + Sync>(signer: &dyn Signer, document: &T, proof: &Proof) -> Result<bool> {
    let payload = signing_input(document, &proof.verification_method, proof.created)?;
    let signature = URL_SAFE_NO_PAD.decode(&proof.proof_value)?;
    signer
        .verify(&payload, &signature, &proof.verification_method)
        .await
}

pub(crate) async fn sign_credential(
    signer: &dyn Signer,
    credential: UnsignedCredential,
    verification_method: &str,
    created: DateTime<Utc>,
) -> Result<VerifiableCredential> {
    let proof = create_proof(signer, &credential, verification_method, created).await?;
    Ok(VerifiableCredential { credential, proof })
}

/// Checks the issuer proof of a credential.
///
/// Returns `Ok(false)` when the signature does not match, or when the proof
/// was made by an identity other than the credential's issuer.
///
/// # Errors
///
/// Returns an error if the proof value is not valid base64url or the signer
/// cannot be resolved by the engine
pub async fn verify_credential(signer: &dyn Signer, credential: &VerifiableCredential) -> Result<bool> {
    if credential.proof.verification_method != credential.credential.issuer {
        debug!(
            credential = credential.id(),
            "Proof was not made by the credential issuer"
        );
        return Ok(false);
    }
    check_proof(signer, &credential.credential, &credential.proof).await
}

/// Bundles credentials into a presentation signed by the engine's identity.
///
/// # Errors
///
/// Returns an error if serialization or signing fails
pub async fn sign_presentation(
    engine: &dyn Engine,
    credentials: Vec<VerifiableCredential>,
) -> Result<VerifiablePresentation> {
    let holder = engine.identity().to_string();
    let presentation = UnsignedPresentation {
        id: format!("urn:uuid:{}", Uuid::new_v4()),
        presentation_type: vec![VERIFIABLE_PRESENTATION.to_string()],
        holder: holder.clone(),
        credentials,
    };
    let proof = create_proof(engine.signer(), &presentation, &holder, Utc::now()).await?;

    Ok(VerifiablePresentation { presentation, proof })
}

/// Checks the holder proof of a presentation and the issuer proof of every
/// credential inside it.
///
/// # Errors
///
/// Returns an error if a proof cannot be decoded or a signer cannot be resolved
pub async fn verify_presentation(
    signer: &dyn Signer,
    presentation: &VerifiablePresentation,
) -> Result<bool> {
    if presentation.proof.verification_method != presentation.presentation.holder
        || !check_proof(signer, &presentation.presentation, &presentation.proof).await?
    {
        return Ok(false);
    }

    for credential in presentation.credentials() {
        if !verify_credential(signer, credential).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestEngine;
    use crate::CredentialBuilder;
    use std::sync::Arc;

    async fn issue(engine: Arc<TestEngine>) -> VerifiableCredential {
        let now = Utc::now();
        CredentialBuilder::new(engine.clone())
            .credential_type(["VerifiableCredential", "EmailCredential"])
            .subject("did:example:holder")
            .issuer(engine.identity())
            .claim("emailAddress", "alice@example.com")
            .valid_from(now)
            .sign_with(engine.identity(), now)
            .issue()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_credential_proof_verifies() {
        let engine = Arc::new(TestEngine::new("did:example:issuer"));
        let vc = issue(engine.clone()).await;

        assert!(verify_credential(engine.signer(), &vc).await.unwrap());
    }

    #[tokio::test]
    async fn test_tampered_claim_fails_verification() {
        let engine = Arc::new(TestEngine::new("did:example:issuer"));
        let mut vc = issue(engine.clone()).await;
        vc.credential
            .claims
            .insert("emailAddress".to_string(), "mallory@example.com".into());

        assert!(!verify_credential(engine.signer(), &vc).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_proof_value_is_an_error() {
        let engine = Arc::new(TestEngine::new("did:example:issuer"));
        let mut vc = issue(engine.clone()).await;
        vc.proof.proof_value = "not base64url!".to_string();

        let result = verify_credential(engine.signer(), &vc).await;
        assert!(matches!(result, Err(crate::Error::Base64Decode(_))));
    }

    #[tokio::test]
    async fn test_presentation_covers_holder_and_credentials() {
        let engine = Arc::new(TestEngine::new("did:example:issuer"));
        let vc = issue(engine.clone()).await;

        let vp = sign_presentation(engine.as_ref(), vec![vc]).await.unwrap();
        assert_eq!(vp.holder(), "did:example:issuer");
        assert_eq!(vp.credentials().len(), 1);
        assert!(verify_presentation(engine.signer(), &vp).await.unwrap());

        let mut forged = vp.clone();
        forged.presentation.holder = "did:example:mallory".to_string();
        assert!(!verify_presentation(engine.signer(), &forged).await.unwrap());
    }
}
