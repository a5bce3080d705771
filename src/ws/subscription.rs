//! Per-connection subscription manager.
//!
//! Tracks which arisan IDs a WebSocket client is subscribed to and
//! provides server-side event filtering.

use std::collections::HashSet;

use crate::domain::ArisanId;

/// Manages the set of arisan subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed arisan IDs. If `subscribe_all` is true, this set is ignored.
    arisan_ids: HashSet<ArisanId>,
    /// Whether the client subscribes to all arisans (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds arisan IDs to the subscription set. `"*"` enables the wildcard.
    pub fn subscribe(&mut self, ids: &[ArisanId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        for id in ids {
            self.arisan_ids.insert(*id);
        }
    }

    /// Removes arisan IDs from the subscription set. The wildcard stays on.
    pub fn unsubscribe(&mut self, ids: &[ArisanId]) {
        for id in ids {
            self.arisan_ids.remove(id);
        }
    }

    /// Returns `true` if the given arisan ID matches the subscription filter.
    #[must_use]
    pub fn matches(&self, arisan_id: ArisanId) -> bool {
        self.subscribe_all || self.arisan_ids.contains(&arisan_id)
    }

    /// Returns the number of explicitly subscribed arisan IDs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.arisan_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

/// Subscription targets parsed from a client command.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SubscriptionTargets {
    /// Explicit arisan ids.
    pub ids: Vec<ArisanId>,
    /// Whether `"*"` was present.
    pub wildcard: bool,
    /// Entries that are neither ids nor `"*"`, rendered as given.
    pub rejected: Vec<String>,
}

/// Parses command targets given as numbers, numeric strings or `"*"`.
#[must_use]
pub fn parse_targets(values: &[serde_json::Value]) -> SubscriptionTargets {
    let mut targets = SubscriptionTargets::default();
    for value in values {
        let parsed = match value {
            serde_json::Value::Number(n) => n.as_u64().map(ArisanId::new),
            serde_json::Value::String(s) if s == "*" => {
                targets.wildcard = true;
                continue;
            }
            serde_json::Value::String(s) => s.parse::<ArisanId>().ok(),
            _ => None,
        };
        match parsed {
            Some(id) => targets.ids.push(id),
            None => targets.rejected.push(value.to_string()),
        }
    }
    targets
}
