//! Owner key model

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Namespace for one user's profile, records and queued operations.
///
/// Derived from the authenticated email by percent-encoding it, so the key
/// can be used directly as a document path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerKey(String);

impl OwnerKey {
    /// Build the owner key for an email address.
    pub fn from_email(email: &str) -> Result<Self> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::InvalidInput("email must not be empty".into()));
        }
        Ok(Self(urlencoding::encode(email).into_owned()))
    }

    /// Wrap a key that is already encoded (e.g. read back from storage).
    #[must_use]
    pub fn from_encoded(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The email this key was derived from, if it decodes cleanly.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        urlencoding::decode(&self.0).ok().map(|email| email.into_owned())
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
