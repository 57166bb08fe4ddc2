//! Subscription document schema

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::db::schemas::Metadata;
use crate::facts::{SubscriptionKind, SubscriptionRecord, SUBSCRIPTION_ACTIVE};

/// Collection name for monetization subscriptions
pub const SUBSCRIPTION_COLLECTION: &str = "subscriptions";

/// Subscription document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SubscriptionDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    /// "seller", "affiliate" or "tip"
    pub kind: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub expires_at: Option<bson::DateTime>,
}

impl SubscriptionDoc {
    /// Convert to a fact record; unknown kinds yield `None`
    pub fn into_record(self) -> Option<SubscriptionRecord> {
        let kind = SubscriptionKind::parse(&self.kind)?;
        Some(SubscriptionRecord {
            kind,
            status: self.status,
            expires_at: self.expires_at.map(|t| t.to_chrono()),
        })
    }
}

/// Pick the row that decides a kind's status when a user has several.
///
/// Rows with an active status beat any other status, and among equals an
/// open-ended row beats a dated one, then the latest expiry wins. If any
/// row is active at a given instant, the chosen one is too, so the result
/// does not depend on the resolution time.
pub fn select_subscription(
    rows: impl IntoIterator<Item = SubscriptionRecord>,
) -> Option<SubscriptionRecord> {
    rows.into_iter().max_by_key(|row| {
        let active = row.status.eq_ignore_ascii_case(SUBSCRIPTION_ACTIVE);
        let expiry = row
            .expires_at
            .map_or(i64::MAX, |expires| expires.timestamp_millis());
        (active, expiry)
    })
}
