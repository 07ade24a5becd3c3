//! Well-known credential types and typed claim extraction.
//!
//! Extraction never guesses: a credential of the wrong type, or one whose
//! claims have the wrong kind, yields `None`.

use crate::credential::{VerifiableCredential, VERIFIABLE_CREDENTIAL};

/// Type of an email address credential.
pub const CREDENTIAL_TYPE_EMAIL: [&str; 2] = [VERIFIABLE_CREDENTIAL, "EmailCredential"];

/// Type of a profile name credential.
pub const CREDENTIAL_TYPE_PROFILE_NAME: [&str; 2] = [VERIFIABLE_CREDENTIAL, "ProfileNameCredential"];

/// Type of an education credential.
pub const CREDENTIAL_TYPE_EDUCATION: [&str; 2] = [VERIFIABLE_CREDENTIAL, "EducationCredential"];

/// Education details carried by an education credential.
#[derive(Debug, Clone, PartialEq)]
pub struct Education {
    /// Degree awarded
    pub degree: String,
    /// Awarding institution
    pub institution: String,
    /// Year of graduation
    pub graduation_year: i64,
    /// Grade point average
    pub gpa: f64,
}

/// Ordered type check, see [`VerifiableCredential::is_type`].
#[must_use]
pub fn is_credential_of_type<T: AsRef<str>>(credential: &VerifiableCredential, credential_type: &[T]) -> bool {
    credential.is_type(credential_type)
}

fn string_claim(credential: &VerifiableCredential, name: &str) -> Option<String> {
    credential.claim(name)?.as_str().map(str::to_string)
}

/// The `emailAddress` claim of an email credential.
#[must_use]
pub fn extract_email(credential: &VerifiableCredential) -> Option<String> {
    if !credential.is_type(&CREDENTIAL_TYPE_EMAIL) {
        return None;
    }
    string_claim(credential, "emailAddress")
}

/// The `firstName` and `lastName` claims of a profile name credential.
#[must_use]
pub fn extract_name(credential: &VerifiableCredential) -> Option<(String, String)> {
    if !credential.is_type(&CREDENTIAL_TYPE_PROFILE_NAME) {
        return None;
    }
    Some((
        string_claim(credential, "firstName")?,
        string_claim(credential, "lastName")?,
    ))
}

/// The degree, institution, graduation year and GPA of an education credential.
#[must_use]
pub fn extract_education(credential: &VerifiableCredential) -> Option<Education> {
    if !credential.is_type(&CREDENTIAL_TYPE_EDUCATION) {
        return None;
    }
    Some(Education {
        degree: string_claim(credential, "degree")?,
        institution: string_claim(credential, "institution")?,
        graduation_year: credential.claim("graduationYear")?.as_i64()?,
        gpa: credential.claim("gpa")?.as_f64()?,
    })
}
