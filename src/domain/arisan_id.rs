//! Type-safe arisan identifier.
//!
//! [`ArisanId`] is a newtype over the sequential slot index assigned by
//! [`super::ArisanRegistry`]. Identifiers are handed out in increasing
//! order and never reused, even after the arisan is deleted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Registry identifier of a single arisan.
///
/// Doubles as the consumer identity the arisan presents to the
/// randomness gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArisanId(u64);

impl ArisanId {
    /// Creates an `ArisanId` from a raw slot index.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw slot index.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the identifier that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ArisanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ArisanId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<ArisanId> for u64 {
    fn from(id: ArisanId) -> Self {
        id.0
    }
}

impl FromStr for ArisanId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}
