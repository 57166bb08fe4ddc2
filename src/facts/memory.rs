//! In-memory fact store
//!
//! Backs tests and dev mode. Can be seeded from a JSON fixture file:
//!
//! ```json
//! {
//!   "users": {
//!     "user-1": {
//!       "subscriptions": [{"kind": "seller", "status": "active", "expires_at": null}],
//!       "profile": {"kyc_status": "approved", "kyc_verified_at": "2024-01-01T00:00:00Z",
//!                   "risk_score": 0.2, "reputation_score": 0.6}
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ProfileRecord, ProfileSource, SubscriptionKind, SubscriptionRecord, SubscriptionSource};
use crate::types::{CapabilityError, Result};

/// Facts for a single user in a fixture file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFacts {
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionRecord>,
    #[serde(default)]
    pub profile: Option<ProfileRecord>,
}

/// Fixture file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactsFixture {
    #[serde(default)]
    pub users: HashMap<String, UserFacts>,
}

/// Concurrent in-memory store of subscription and profile facts
#[derive(Default)]
pub struct InMemoryFactStore {
    subscriptions: DashMap<(String, SubscriptionKind), SubscriptionRecord>,
    profiles: DashMap<String, ProfileRecord>,
    fail_reads: AtomicBool,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from fixture contents
    pub fn from_fixture(fixture: FactsFixture) -> Self {
        let store = Self::new();
        for (user_id, facts) in fixture.users {
            for subscription in facts.subscriptions {
                store.put_subscription(&user_id, subscription);
            }
            if let Some(profile) = facts.profile {
                store.put_profile(&user_id, profile);
            }
        }
        store
    }

    /// Load a store from a JSON fixture file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CapabilityError::Config(format!("Cannot read facts fixture {}: {}", path.display(), e))
        })?;
        let fixture: FactsFixture = serde_json::from_str(&raw)?;
        info!(
            "Loaded facts fixture {} ({} users)",
            path.display(),
            fixture.users.len()
        );
        Ok(Self::from_fixture(fixture))
    }

    /// Insert or replace the row for the record's kind
    pub fn put_subscription(&self, user_id: &str, record: SubscriptionRecord) {
        self.subscriptions
            .insert((user_id.to_string(), record.kind), record);
    }

    pub fn put_profile(&self, user_id: &str, profile: ProfileRecord) {
        self.profiles.insert(user_id.to_string(), profile);
    }

    /// Make every subsequent read fail, simulating an unreachable store
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CapabilityError::FactSource(
                "in-memory store marked unavailable".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionSource for InMemoryFactStore {
    async fn find_subscription(
        &self,
        user_id: &str,
        kind: SubscriptionKind,
    ) -> Result<Option<SubscriptionRecord>> {
        self.check_available()?;
        Ok(self
            .subscriptions
            .get(&(user_id.to_string(), kind))
            .map(|row| row.value().clone()))
    }
}

#[async_trait]
impl ProfileSource for InMemoryFactStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>> {
        self.check_available()?;
        Ok(self.profiles.get(user_id).map(|row| row.value().clone()))
    }
}
