//! Fluent credential construction.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use vc_exchange_core::{plugin::Engine, CredentialBuilder};
//!
//! async fn issue(engine: Arc<dyn Engine>, holder: &str) -> vc_exchange_core::Result<()> {
//!     let issuer = engine.identity().to_string();
//!     let credential = CredentialBuilder::new(engine)
//!         .credential_type(["VerifiableCredential", "EmailCredential"])
//!         .subject(holder)
//!         .issuer(&issuer)
//!         .claim("emailAddress", "alice@example.com")
//!         .claim("verified", true)
//!         .valid_from(Utc::now())
//!         .sign_with(&issuer, Utc::now())
//!         .issue()
//!         .await?;
//!     println!("issued {}", credential.id());
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    credential::{ClaimValue, UnsignedCredential, VerifiableCredential},
    error::{Error, Result},
    plugin::Engine,
    proof::sign_credential,
    types::{CredentialBody, Message, MessageKind},
};

/// Accumulates credential fields; nothing is validated until a terminal call.
#[must_use]
pub struct CredentialBuilder {
    engine: Arc<dyn Engine>,
    credential_type: Option<Vec<String>>,
    subject: Option<String>,
    issuer: Option<String>,
    claims: BTreeMap<String, ClaimValue>,
    valid_from: Option<DateTime<Utc>>,
    signer: Option<(String, DateTime<Utc>)>,
}

impl fmt::Debug for CredentialBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBuilder")
            .field("credential_type", &self.credential_type)
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("claims", &self.claims)
            .field("valid_from", &self.valid_from)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl CredentialBuilder {
    /// Start a credential that will be signed through `engine`
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            credential_type: None,
            subject: None,
            issuer: None,
            claims: BTreeMap::new(),
            valid_from: None,
            signer: None,
        }
    }

    /// Set the ordered credential type
    pub fn credential_type(mut self, credential_type: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.credential_type = Some(credential_type.into_iter().map(Into::into).collect());
        self
    }

    /// Set the subject identity
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the issuer identity
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Add a claim. A later claim with the same name replaces the earlier one.
    pub fn claim(mut self, name: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Set the start of the validity period
    pub fn valid_from(mut self, valid_from: DateTime<Utc>) -> Self {
        self.valid_from = Some(valid_from);
        self
    }

    /// Bind the signing identity and signing time. The engine signs at issue.
    ///
    /// The identity must be the credential's issuer; a mismatch is rejected
    /// by the terminal call.
    pub fn sign_with(mut self, signer: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        self.signer = Some((signer.into(), timestamp));
        self
    }

    /// Consume the builder into an unsigned draft plus the signing binding.
    ///
    /// Required fields are checked in the order type, subject, issuer,
    /// `valid_from`, `sign_with`; the first missing one is reported. The
    /// signing identity is then checked against the issuer.
    fn into_draft(self) -> Result<(Arc<dyn Engine>, UnsignedCredential, String, DateTime<Utc>)> {
        let credential_type = self
            .credential_type
            .ok_or(Error::MissingRequiredField("type"))?;
        let subject = self.subject.ok_or(Error::MissingRequiredField("subject"))?;
        let issuer = self.issuer.ok_or(Error::MissingRequiredField("issuer"))?;
        let valid_from = self
            .valid_from
            .ok_or(Error::MissingRequiredField("valid_from"))?;
        let (signer, signed_at) = self.signer.ok_or(Error::MissingRequiredField("sign_with"))?;
        if signer != issuer {
            return Err(Error::Signing(format!("{signer} cannot sign for issuer {issuer}")));
        }

        let draft = UnsignedCredential {
            id: format!("urn:uuid:{}", Uuid::new_v4()),
            credential_type,
            issuer,
            subject,
            valid_from,
            claims: self.claims,
        };
        Ok((self.engine, draft, signer, signed_at))
    }

    /// Sign the accumulated draft through the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing, the signer is not the
    /// issuer, or signing fails
    pub async fn issue(self) -> Result<VerifiableCredential> {
        let (engine, draft, signer, signed_at) = self.into_draft()?;
        let credential = sign_credential(engine.signer(), draft, &signer, signed_at).await?;

        info!(
            credential = credential.id(),
            subject = credential.subject(),
            "Issued credential"
        );
        Ok(credential)
    }

    /// Issue the credential and transmit it to its subject.
    ///
    /// # Errors
    ///
    /// Returns an error if issuing fails or the subject cannot be reached
    pub async fn issue_and_send(self) -> Result<IssuedCredential> {
        let engine = self.engine.clone();
        let credential = self.issue().await?;
        let issued = IssuedCredential { engine, credential };

        issued.send(issued.credential.subject()).await?;
        Ok(issued)
    }
}

/// A signed credential that can be transmitted to peers.
pub struct IssuedCredential {
    engine: Arc<dyn Engine>,
    credential: VerifiableCredential,
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl IssuedCredential {
    /// The issued credential
    #[must_use]
    pub fn credential(&self) -> &VerifiableCredential {
        &self.credential
    }

    /// Release the credential
    #[must_use]
    pub fn into_credential(self) -> VerifiableCredential {
        self.credential
    }

    /// Transmit the credential to `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be built or sent
    pub async fn send(&self, to: &str) -> Result<()> {
        let body = CredentialBody {
            credential: self.credential.clone(),
        };
        let message = Message::new(MessageKind::Credential, &body)?
            .from(self.engine.identity())
            .to([to]);

        debug!(credential = self.credential.id(), to, "Sending credential");
        self.engine.transport().send(to, message).await
    }
}
