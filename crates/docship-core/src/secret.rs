//! Credential handling.
//!
//! A [`Credential`] never prints its value: `Debug` and `Display` both render
//! a placeholder, and it deliberately does not implement `Serialize`.

use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// An opaque secret string, such as a publish access token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Borrow the raw value. Only backends handing the value to a process
    /// environment should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replace every occurrence of the secret in `text` with a placeholder.
    pub fn redact(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, REDACTED)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&REDACTED).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A secret-flagged environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVar {
    pub name: String,
    pub value: Credential,
}

impl SecretVar {
    pub fn new(name: impl Into<String>, value: Credential) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Redact every secret in `secrets` from `text`.
pub fn redact_all(secrets: &[SecretVar], text: &str) -> String {
    secrets
        .iter()
        .fold(text.to_string(), |acc, s| s.value.redact(&acc))
}
