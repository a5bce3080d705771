//! Caller identities.
//!
//! An [`Identity`] is the account that performs an operation: an
//! organizer creating an arisan, a participant joining or paying, or a
//! winner receiving the pot. The gateway does not manage wallets; it
//! only compares identities for equality.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Longest accepted identity string.
pub const MAX_IDENTITY_LEN: usize = 128;

/// Account identity of an organizer or participant.
///
/// Hex account addresses (`0x...`) are normalized to lowercase so the
/// same account always compares equal regardless of checksum casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parses and normalizes an identity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidIdentity`] if the input is empty,
    /// longer than [`MAX_IDENTITY_LEN`], or contains characters outside
    /// `[A-Za-z0-9_.:-]`.
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::InvalidIdentity("identity is empty".to_string()));
        }
        if trimmed.len() > MAX_IDENTITY_LEN {
            return Err(GatewayError::InvalidIdentity(format!(
                "identity longer than {MAX_IDENTITY_LEN} characters"
            )));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')))
        {
            return Err(GatewayError::InvalidIdentity(format!(
                "unexpected character {bad:?} in identity"
            )));
        }

        let normalized = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            trimmed.to_ascii_lowercase()
        } else {
            trimmed.to_string()
        };
        Ok(Self(normalized))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn hex_addresses_are_lowercased() {
        let Ok(a) = Identity::parse("0xAbCdEF0123") else {
            panic!("valid identity");
        };
        let Ok(b) = Identity::parse("0xabcdef0123") else {
            panic!("valid identity");
        };
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcdef0123");
    }

    #[test]
    fn plain_names_keep_their_case() {
        let Ok(id) = Identity::parse("  Alice ") else {
            panic!("valid identity");
        };
        assert_eq!(id.as_str(), "Alice");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(
            Identity::parse("   "),
            Err(GatewayError::InvalidIdentity(_))
        ));
        assert!(matches!(
            Identity::parse("bob smith"),
            Err(GatewayError::InvalidIdentity(_))
        ));
        assert!(Identity::parse(&"a".repeat(MAX_IDENTITY_LEN + 1)).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<Identity, _> = serde_json::from_str("\"0xBEEF\"");
        let Ok(ok) = ok else {
            panic!("valid identity");
        };
        assert_eq!(ok.as_str(), "0xbeef");

        let bad: Result<Identity, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }
}
