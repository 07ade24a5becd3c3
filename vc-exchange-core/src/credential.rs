//! Verifiable credential data model.
//!
//! Credentials and presentations are immutable once signed: their fields are
//! only reachable through accessors, and new values are produced by the
//! [`CredentialBuilder`](crate::builder::CredentialBuilder) and
//! [`sign_presentation`](crate::proof::sign_presentation).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::types::RequestId;

/// The base type tag every credential carries.
pub const VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";

/// The type tag of every presentation.
pub const VERIFIABLE_PRESENTATION: &str = "VerifiablePresentation";

/// A claim value. Claims are strings, booleans, integers or floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    /// A boolean claim
    Bool(bool),
    /// An integer claim
    Integer(i64),
    /// A floating point claim
    Float(f64),
    /// A string claim
    String(String),
}

impl ClaimValue {
    /// The value as a string slice, if it is a string claim
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// The value as a bool, if it is a boolean claim
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as an integer, if it is an integer claim
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as a float, if it is a float claim
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (a, b) => a.as_number()?.partial_cmp(&b.as_number()?),
        }
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ClaimValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for ClaimValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ClaimValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Comparison applied by a [`CredentialParameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// The claim equals the value
    Equals,
    /// The claim differs from the value
    NotEquals,
    /// The claim is greater than the value
    GreaterThan,
    /// The claim is greater than or equal to the value
    GreaterThanOrEquals,
    /// The claim is less than the value
    LessThan,
    /// The claim is less than or equal to the value
    LessThanOrEquals,
}

impl Operator {
    /// Evaluate `actual <op> expected`.
    ///
    /// Integers and floats compare numerically, strings lexically. Booleans
    /// only support equality. Values of unrelated kinds are never equal and
    /// never ordered.
    #[must_use]
    pub fn evaluate(self, actual: &ClaimValue, expected: &ClaimValue) -> bool {
        if let (ClaimValue::Bool(a), ClaimValue::Bool(b)) = (actual, expected) {
            return match self {
                Self::Equals => a == b,
                Self::NotEquals => a != b,
                _ => false,
            };
        }

        let ordering = actual.compare(expected);
        match self {
            Self::Equals => ordering == Some(Ordering::Equal),
            Self::NotEquals => ordering != Some(Ordering::Equal),
            Self::GreaterThan => ordering == Some(Ordering::Greater),
            Self::GreaterThanOrEquals => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
            Self::LessThan => ordering == Some(Ordering::Less),
            Self::LessThanOrEquals => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

/// A constraint on one field of a requested credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialParameter {
    /// The claim name; `id` refers to the credential subject
    pub field: String,
    /// How the claim is compared
    pub operator: Operator,
    /// The value the claim is compared against
    pub value: ClaimValue,
}

impl CredentialParameter {
    /// Create a new parameter
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<ClaimValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Describes a credential being requested: its type plus field constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialDetail {
    /// The requested credential type, order significant
    pub credential_type: Vec<String>,
    /// Constraints every matching credential must satisfy
    #[serde(default)]
    pub parameters: Vec<CredentialParameter>,
}

impl CredentialDetail {
    /// Request a credential of the given type with no constraints
    pub fn new(credential_type: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            credential_type: credential_type.into_iter().map(Into::into).collect(),
            parameters: Vec::new(),
        }
    }

    /// Add a constraint
    #[must_use]
    pub fn parameter(mut self, parameter: CredentialParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Whether the credential has the requested type and satisfies every
    /// constraint. A constraint on a claim the credential lacks never matches.
    #[must_use]
    pub fn matches(&self, credential: &VerifiableCredential) -> bool {
        credential.is_type(&self.credential_type)
            && self.parameters.iter().all(|parameter| {
                credential
                    .field(&parameter.field)
                    .is_some_and(|actual| parameter.operator.evaluate(&actual, &parameter.value))
            })
    }
}

/// Compare two credential types: same length and same tag at every position.
#[must_use]
pub fn same_type<A: AsRef<str>, B: AsRef<str>>(left: &[A], right: &[B]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(a, b)| a.as_ref() == b.as_ref())
}

/// A signature attached to a credential or presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// The identity whose key produced the signature
    pub verification_method: String,
    /// When the signature was produced
    pub created: DateTime<Utc>,
    /// Base64url encoded signature bytes
    pub proof_value: String,
}

/// The signed portion of a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedCredential {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) credential_type: Vec<String>,
    pub(crate) issuer: String,
    pub(crate) subject: String,
    pub(crate) valid_from: DateTime<Utc>,
    pub(crate) claims: BTreeMap<String, ClaimValue>,
}

/// A signed claim set about a subject, attributable to an issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiableCredential {
    #[serde(flatten)]
    pub(crate) credential: UnsignedCredential,
    pub(crate) proof: Proof,
}

impl VerifiableCredential {
    /// The credential identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.credential.id
    }

    /// The ordered credential type
    #[must_use]
    pub fn credential_type(&self) -> &[String] {
        &self.credential.credential_type
    }

    /// The issuing identity
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.credential.issuer
    }

    /// The subject identity
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.credential.subject
    }

    /// Start of the validity period
    #[must_use]
    pub fn valid_from(&self) -> DateTime<Utc> {
        self.credential.valid_from
    }

    /// All subject claims
    #[must_use]
    pub fn claims(&self) -> &BTreeMap<String, ClaimValue> {
        &self.credential.claims
    }

    /// A single subject claim
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&ClaimValue> {
        self.credential.claims.get(name)
    }

    /// The issuer's proof
    #[must_use]
    pub fn proof(&self) -> &Proof {
        &self.proof
    }

    /// Ordered type comparison
    #[must_use]
    pub fn is_type<T: AsRef<str>>(&self, credential_type: &[T]) -> bool {
        same_type(&self.credential.credential_type, credential_type)
    }

    /// Resolve a request field name against this credential.
    fn field(&self, name: &str) -> Option<ClaimValue> {
        match name {
            "id" => Some(ClaimValue::String(self.credential.subject.clone())),
            _ => self.claim(name).cloned(),
        }
    }
}

/// The signed portion of a presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedPresentation {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) presentation_type: Vec<String>,
    pub(crate) holder: String,
    #[serde(rename = "verifiableCredential")]
    pub(crate) credentials: Vec<VerifiableCredential>,
}

/// A holder-signed bundle of credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiablePresentation {
    #[serde(flatten)]
    pub(crate) presentation: UnsignedPresentation,
    pub(crate) proof: Proof,
}

impl VerifiablePresentation {
    /// The presentation identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.presentation.id
    }

    /// The presenting identity
    #[must_use]
    pub fn holder(&self) -> &str {
        &self.presentation.holder
    }

    /// The presented credentials
    #[must_use]
    pub fn credentials(&self) -> &[VerifiableCredential] {
        &self.presentation.credentials
    }

    /// The holder's proof
    #[must_use]
    pub fn proof(&self) -> &Proof {
        &self.proof
    }
}

/// Outcome reported by the holder of a presentation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The holder shared presentations
    Accepted,
    /// The holder declined
    Rejected,
    /// The holder could not process the request
    Error,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Error => "error",
        })
    }
}

/// A response to exactly one presentation request.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialResponse {
    request_id: RequestId,
    from: String,
    status: ResponseStatus,
    presentations: Vec<VerifiablePresentation>,
}

impl CredentialResponse {
    /// Create a response
    pub fn new(
        request_id: RequestId,
        from: impl Into<String>,
        status: ResponseStatus,
        presentations: Vec<VerifiablePresentation>,
    ) -> Self {
        Self {
            request_id,
            from: from.into(),
            status,
            presentations,
        }
    }

    /// The request this response answers
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// The responding identity
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    /// The holder's decision
    #[must_use]
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// The shared presentations
    #[must_use]
    pub fn presentations(&self) -> &[VerifiablePresentation] {
        &self.presentations
    }

    /// Every credential across all presentations
    pub fn credentials(&self) -> impl Iterator<Item = &VerifiableCredential> {
        self.presentations
            .iter()
            .flat_map(VerifiablePresentation::credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn credential(claims: &[(&str, ClaimValue)]) -> VerifiableCredential {
        VerifiableCredential {
            credential: UnsignedCredential {
                id: "urn:uuid:1".to_string(),
                credential_type: vec![VERIFIABLE_CREDENTIAL.to_string(), "EmailCredential".to_string()],
                issuer: "did:example:issuer".to_string(),
                subject: "did:example:holder".to_string(),
                valid_from: Utc::now(),
                claims: claims
                    .iter()
                    .map(|(name, value)| ((*name).to_string(), value.clone()))
                    .collect(),
            },
            proof: Proof {
                verification_method: "did:example:issuer".to_string(),
                created: Utc::now(),
                proof_value: String::new(),
            },
        }
    }

    #[test]
    fn test_type_equality_is_ordered() {
        assert!(same_type(&["VerifiableCredential", "EmailCredential"], &["VerifiableCredential", "EmailCredential"]));
        assert!(!same_type(&["EmailCredential", "VerifiableCredential"], &["VerifiableCredential", "EmailCredential"]));
        assert!(!same_type(&["VerifiableCredential"], &["VerifiableCredential", "EmailCredential"]));
    }

    #[test]
    fn test_claim_values_keep_their_kind_through_json() {
        let claims: BTreeMap<String, ClaimValue> = serde_json::from_value(json!({
            "email": "alice@example.com",
            "verified": true,
            "graduationYear": 2020,
            "gpa": 3.5,
        }))
        .unwrap();

        assert_eq!(claims["email"], ClaimValue::from("alice@example.com"));
        assert_eq!(claims["verified"], ClaimValue::Bool(true));
        assert_eq!(claims["graduationYear"], ClaimValue::Integer(2020));
        assert_eq!(claims["gpa"], ClaimValue::Float(3.5));
    }

    #[test]
    fn test_operator_evaluation() {
        let year = ClaimValue::from(2020);
        assert!(Operator::GreaterThan.evaluate(&year, &ClaimValue::from(2019)));
        assert!(Operator::LessThanOrEquals.evaluate(&year, &ClaimValue::from(2020.0)));
        assert!(!Operator::LessThan.evaluate(&year, &ClaimValue::from("2021")));
        assert!(Operator::NotEquals.evaluate(&year, &ClaimValue::from("2020")));
        assert!(Operator::Equals.evaluate(&ClaimValue::Bool(true), &ClaimValue::Bool(true)));
        assert!(!Operator::GreaterThan.evaluate(&ClaimValue::Bool(true), &ClaimValue::Bool(false)));
        assert!(Operator::NotEquals.evaluate(&ClaimValue::from("a@b.c"), &ClaimValue::from("")));
    }

    #[test]
    fn test_detail_matching() {
        let vc = credential(&[("emailAddress", ClaimValue::from("alice@example.com"))]);

        let any_email = CredentialDetail::new([VERIFIABLE_CREDENTIAL, "EmailCredential"])
            .parameter(CredentialParameter::new("emailAddress", Operator::NotEquals, ""));
        assert!(any_email.matches(&vc));

        let subject = CredentialDetail::new([VERIFIABLE_CREDENTIAL, "EmailCredential"])
            .parameter(CredentialParameter::new("id", Operator::Equals, "did:example:holder"));
        assert!(subject.matches(&vc));

        let missing_claim = CredentialDetail::new([VERIFIABLE_CREDENTIAL, "EmailCredential"])
            .parameter(CredentialParameter::new("phone", Operator::NotEquals, ""));
        assert!(!missing_claim.matches(&vc));

        let wrong_type = CredentialDetail::new([VERIFIABLE_CREDENTIAL, "ProfileNameCredential"]);
        assert!(!wrong_type.matches(&vc));
    }

    #[test]
    fn test_credential_wire_shape() {
        let vc = credential(&[("verified", ClaimValue::Bool(true))]);
        let value = serde_json::to_value(&vc).unwrap();

        assert_eq!(value["type"], json!(["VerifiableCredential", "EmailCredential"]));
        assert!(value["validFrom"].is_string());
        assert_eq!(value["proof"]["verificationMethod"], json!("did:example:issuer"));

        let decoded: VerifiableCredential = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, vc);
    }
}
