//! Fact sources for capability resolution
//!
//! The engine reads subscription and profile facts through the read-only
//! traits defined here. Storage rows are converted into the fixed-shape
//! records below at the boundary (defaults filled, non-finite scores
//! dropped), so the probes and the resolver never see a loosely-typed row.
//!
//! Implementations:
//! - [`memory::InMemoryFactStore`] for tests and dev mode
//! - [`crate::db::MongoFactStore`] for deployed instances

pub mod memory;
pub mod probes;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Result;

pub use memory::InMemoryFactStore;
pub use probes::{
    check_kyc_capability, check_reputation_capability, check_risk_capability,
    check_subscription_capability, KycCapability, ReputationCapability, RiskCapability,
    SubscriptionCapability,
};

/// KYC status value that counts as approved
pub const KYC_APPROVED: &str = "approved";

/// Subscription status value that counts as active
pub const SUBSCRIPTION_ACTIVE: &str = "active";

/// Monetization subscription kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Seller,
    Affiliate,
    Tip,
}

impl SubscriptionKind {
    /// Classification order when several kinds are active at once.
    /// The first active kind wins.
    pub const PRIORITY: [SubscriptionKind; 3] = [Self::Seller, Self::Affiliate, Self::Tip];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seller => "seller",
            Self::Affiliate => "affiliate",
            Self::Tip => "tip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "seller" => Some(Self::Seller),
            "affiliate" => Some(Self::Affiliate),
            "tip" => Some(Self::Tip),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate subscription status across all kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// At least one kind is currently active
    Active,
    /// No kind is active, but at least one has existed
    Expired,
    /// No subscription of any kind has ever existed
    None,
}

/// One subscription row for a single kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub kind: SubscriptionKind,
    /// Raw status string as stored (e.g. "active", "cancelled")
    pub status: String,
    /// Expiry; `None` means open-ended
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    pub fn new(kind: SubscriptionKind, status: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            kind,
            status: status.into(),
            expires_at,
        }
    }

    /// Active status and not past its expiry at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status.eq_ignore_ascii_case(SUBSCRIPTION_ACTIVE)
            && self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// Profile facts relevant to monetization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub kyc_status: Option<String>,
    pub kyc_verified_at: Option<DateTime<Utc>>,
    pub risk_score: Option<f64>,
    pub reputation_score: Option<f64>,
}

impl ProfileRecord {
    /// Drop non-finite scores and clamp risk into [0, 1]
    pub fn sanitized(mut self) -> Self {
        self.risk_score = self
            .risk_score
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0));
        self.reputation_score = self.reputation_score.filter(|s| s.is_finite());
        self
    }
}

/// Read-only subscription lookup, keyed by user
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// Zero or one row for the given kind
    async fn find_subscription(
        &self,
        user_id: &str,
        kind: SubscriptionKind,
    ) -> Result<Option<SubscriptionRecord>>;
}

/// Read-only profile lookup, keyed by user
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn find_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>>;
}

/// Region / sanctions compliance predicate
pub trait RegionPolicy: Send + Sync {
    fn is_compliant(&self, user_id: &str) -> bool;
}

/// Region policy that accepts every user
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllRegions;

impl RegionPolicy for AllowAllRegions {
    fn is_compliant(&self, _user_id: &str) -> bool {
        true
    }
}

/// Region policy that rejects an explicit set of users
#[derive(Debug, Clone, Default)]
pub struct BlockedUsers {
    blocked: std::collections::HashSet<String>,
}

impl BlockedUsers {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked: users.into_iter().map(Into::into).collect(),
        }
    }
}

impl RegionPolicy for BlockedUsers {
    fn is_compliant(&self, user_id: &str) -> bool {
        !self.blocked.contains(user_id)
    }
}
