//! Credential handle.
//!
//! The token itself is owned by an external process; this crate only
//! carries it around, compares it, and hands it to the HTTP layer.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// An opaque credential.
///
/// Equality compares the secret material. `Debug` never prints it.
#[derive(Clone)]
#[non_exhaustive]
pub enum Credential {
    /// OAuth bearer token.
    Token(SecretString),
}

impl Credential {
    /// Creates a bearer-token credential.
    pub fn token(value: impl Into<String>) -> Self {
        Credential::Token(SecretString::from(value.into()))
    }

    /// Returns the raw secret.
    ///
    /// Only the HTTP layer and the shared store should call this.
    pub fn expose(&self) -> &str {
        match self {
            Credential::Token(secret) => secret.expose_secret(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        match self {
            Credential::Token(secret) => format!("Bearer {}", secret.expose_secret()),
        }
    }

    /// Short name of the variant, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Token(_) => "token",
        }
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Credential::Token(a), Credential::Token(b)) => a.expose_secret() == b.expose_secret(),
        }
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential")
            .field(&self.kind())
            .field(&"[redacted]")
            .finish()
    }
}
