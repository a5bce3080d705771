//! Randomness gateway boundary.
//!
//! Winner selection never computes randomness locally. An arisan asks a
//! [`RandomnessGateway`] for random words and receives a [`RequestId`]
//! back; the words arrive later as a [`Fulfillment`] addressed to that
//! exact request. [`coordinator::LocalVrfCoordinator`] is the in-process
//! implementation used by the gateway binary and the tests.

pub mod coordinator;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::{ArisanId, Identity};
use crate::error::GatewayError;

pub use coordinator::{LocalVrfCoordinator, SubscriptionView};

/// Handle of a single randomness request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wraps a raw request number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw request number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a funded randomness subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a raw subscription number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw subscription number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 256-bit random word delivered by the gateway.
///
/// Serialized as a `0x`-prefixed hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RandomWord([u8; 32]);

impl RandomWord {
    /// Wraps 32 big-endian bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Builds a word whose numeric value is `value`.
    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        if let Some(low) = bytes.get_mut(16..) {
            low.copy_from_slice(&value.to_be_bytes());
        }
        Self(bytes)
    }

    /// Returns the big-endian bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Reduces the full 256-bit value modulo `modulus`.
    ///
    /// Returns `None` when `modulus` is zero.
    #[must_use]
    pub fn reduce(&self, modulus: usize) -> Option<usize> {
        if modulus == 0 {
            return None;
        }
        let m = modulus as u128;
        let rem = self
            .0
            .iter()
            .fold(0u128, |acc, byte| (acc * 256 + u128::from(*byte)) % m);
        usize::try_from(rem).ok()
    }

    /// Returns the `0x`-prefixed hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses a `0x`-prefixed (or bare) 64-digit hex string.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the input is not 32
    /// bytes of hex.
    pub fn from_hex(raw: &str) -> Result<Self, GatewayError> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid random word: {e}")))?;
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            GatewayError::InvalidRequest("random word must be 32 bytes".to_string())
        })?;
        Ok(Self(array))
    }
}

impl Serialize for RandomWord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RandomWord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Coordinates of the randomness provider an arisan draws from.
///
/// Passed explicitly at creation time; the gateway defaults come from
/// [`crate::config::GatewayConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessConfig {
    /// Name of the coordinator serving the requests.
    pub coordinator: String,
    /// Key hash selecting the gas lane (`0x` + 64 hex digits).
    pub key_hash: String,
    /// Subscription that pays for the requests.
    pub subscription_id: SubscriptionId,
    /// Gas budget granted to the fulfillment callback.
    pub callback_gas_limit: u32,
    /// Confirmations the coordinator waits before fulfilling.
    pub request_confirmations: u16,
    /// Random words requested per draw.
    pub num_words: u32,
}

impl RandomnessConfig {
    /// Checks that the coordinates can be used to issue requests.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfiguration`] if the key hash is
    /// not 32 bytes of hex, or the gas limit or word count is zero.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let digits = self.key_hash.strip_prefix("0x").unwrap_or(&self.key_hash);
        let key_ok = digits.len() == 64 && hex::decode(digits).is_ok();
        if !key_ok {
            return Err(GatewayError::InvalidConfiguration(format!(
                "key hash must be 32 bytes of hex, got {:?}",
                self.key_hash
            )));
        }
        if self.callback_gas_limit == 0 {
            return Err(GatewayError::InvalidConfiguration(
                "callback gas limit must be positive".to_string(),
            ));
        }
        if self.num_words == 0 {
            return Err(GatewayError::InvalidConfiguration(
                "at least one random word must be requested".to_string(),
            ));
        }
        Ok(())
    }
}

/// A request for random words on behalf of a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RandomnessRequest {
    /// Arisan that will receive the fulfillment.
    pub consumer: ArisanId,
    /// Gas lane key hash.
    pub key_hash: String,
    /// Paying subscription.
    pub subscription_id: SubscriptionId,
    /// Confirmations to wait.
    pub request_confirmations: u16,
    /// Callback gas budget.
    pub callback_gas_limit: u32,
    /// Number of words to deliver.
    pub num_words: u32,
}

impl RandomnessRequest {
    /// Builds a request for `consumer` from its randomness coordinates.
    #[must_use]
    pub fn for_consumer(consumer: ArisanId, config: &RandomnessConfig) -> Self {
        Self {
            consumer,
            key_hash: config.key_hash.clone(),
            subscription_id: config.subscription_id,
            request_confirmations: config.request_confirmations,
            callback_gas_limit: config.callback_gas_limit,
            num_words: config.num_words,
        }
    }
}

/// A request accepted by the coordinator and not yet fulfilled.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequest {
    /// Request handle.
    pub request_id: RequestId,
    /// The request as issued.
    pub request: RandomnessRequest,
    /// When the coordinator accepted the request.
    pub requested_at: DateTime<Utc>,
}

/// Random words delivered against a specific request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fulfillment {
    /// Request being answered.
    pub request_id: RequestId,
    /// Arisan the words are addressed to.
    pub consumer: ArisanId,
    /// The random words.
    pub random_words: Vec<RandomWord>,
}

/// Source of verifiable randomness.
///
/// Requests are accepted synchronously and answered later; the answer
/// is routed back to the consumer by whoever drives the gateway (see
/// [`crate::service::fulfillment`]).
pub trait RandomnessGateway: Send + Sync + fmt::Debug {
    /// Authorizes `consumer` to issue requests against `subscription_id`
    /// on behalf of `requester`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SubscriptionNotFound`] if the subscription
    /// does not exist, or [`GatewayError::SubscriptionNotOwned`] if it is
    /// owned by someone other than `requester`.
    fn add_consumer(
        &self,
        subscription_id: SubscriptionId,
        requester: &Identity,
        consumer: ArisanId,
    ) -> Result<(), GatewayError>;

    /// Revokes a consumer authorization. Revoking an absent consumer is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SubscriptionNotFound`] if the subscription
    /// does not exist.
    fn remove_consumer(
        &self,
        subscription_id: SubscriptionId,
        consumer: ArisanId,
    ) -> Result<(), GatewayError>;

    /// Issues a randomness request and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConsumer`] if the consumer is not
    /// registered on the subscription, or
    /// [`GatewayError::InsufficientSubscriptionBalance`] if the
    /// subscription cannot pay for the request.
    fn request_random_words(&self, request: RandomnessRequest) -> Result<RequestId, GatewayError>;
}
