//! Wei-denominated amounts.
//!
//! Contributions, pots and payouts are integral wei values stored as
//! `u128`. In JSON they travel as decimal strings to avoid precision loss.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GatewayError;

/// Number of decimal places between wei and ether.
pub const ETHER_DECIMALS: u32 = 18;

const WEI_PER_ETHER: u128 = 10u128.pow(ETHER_DECIMALS);

/// A non-negative amount of wei.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from raw wei.
    #[must_use]
    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    /// Returns the raw wei value.
    #[must_use]
    pub const fn wei(self) -> u128 {
        self.0
    }

    /// Returns `true` if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Subtracts `other`, returning `None` on underflow.
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Parses a decimal ether string such as `"0.02"` into wei.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the string is not a
    /// plain decimal number, has more than 18 fractional digits, or does
    /// not fit in `u128` wei.
    pub fn parse_ether(raw: &str) -> Result<Self, GatewayError> {
        let s = raw.trim();
        let invalid = || GatewayError::InvalidRequest(format!("invalid ether amount: {raw:?}"));

        let (whole, fraction) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        if fraction.len() > ETHER_DECIMALS as usize {
            return Err(invalid());
        }

        let whole_wei = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .ok()
                .and_then(|w| w.checked_mul(WEI_PER_ETHER))
                .ok_or_else(invalid)?
        };

        let fraction_wei = if fraction.is_empty() {
            0
        } else {
            let scale = 10u128.pow(ETHER_DECIMALS - fraction.len() as u32);
            fraction
                .parse::<u128>()
                .ok()
                .and_then(|f| f.checked_mul(scale))
                .ok_or_else(invalid)?
        };

        whole_wei
            .checked_add(fraction_wei)
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Renders the amount in ether with trailing zeros trimmed
    /// (`20000000000000000` wei → `"0.02"`).
    #[must_use]
    pub fn to_ether_string(self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let fraction = self.0 % WEI_PER_ETHER;
        if fraction == 0 {
            return whole.to_string();
        }
        let padded = format!("{fraction:018}");
        format!("{whole}.{}", padded.trim_end_matches('0'))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = GatewayError;

    /// Parses a decimal wei string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Self)
            .map_err(|_| GatewayError::InvalidRequest(format!("invalid wei amount: {s:?}")))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
