//! Capability probes
//!
//! Each probe performs its own read against a fact source and never fails:
//! a read error is logged and degrades to the documented default
//! (fail-closed for booleans, default score for numbers). `observed`
//! records whether the source actually answered.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{
    ProfileRecord, ProfileSource, SubscriptionKind, SubscriptionRecord, SubscriptionSource,
    SubscriptionStatus, KYC_APPROVED,
};

/// Risk score used when no score is recorded
pub const DEFAULT_RISK_SCORE: f64 = 0.5;

/// Risk scores strictly below this are acceptable
pub const RISK_ACCEPTABLE_BELOW: f64 = 0.7;

/// Reputation score used when no score is recorded
pub const DEFAULT_REPUTATION_SCORE: f64 = 0.0;

/// Reputation scores at or above this are acceptable
pub const REPUTATION_ACCEPTABLE_FROM: f64 = 0.3;

/// Outcome of the subscription probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionCapability {
    /// First active kind in priority order
    pub kind: Option<SubscriptionKind>,
    pub status: SubscriptionStatus,
    pub observed: bool,
}

impl SubscriptionCapability {
    pub fn has_capability(&self) -> bool {
        self.kind.is_some()
    }
}

/// Outcome of the KYC probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KycCapability {
    pub verified: bool,
    pub observed: bool,
}

/// Outcome of the risk probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskCapability {
    pub score: f64,
    pub acceptable: bool,
    pub observed: bool,
}

impl RiskCapability {
    fn from_score(score: f64, observed: bool) -> Self {
        Self {
            score,
            acceptable: score < RISK_ACCEPTABLE_BELOW,
            observed,
        }
    }
}

/// Outcome of the reputation probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReputationCapability {
    pub score: f64,
    pub acceptable: bool,
    pub observed: bool,
}

impl ReputationCapability {
    fn from_score(score: f64, observed: bool) -> Self {
        Self {
            score,
            acceptable: score >= REPUTATION_ACCEPTABLE_FROM,
            observed,
        }
    }
}

/// Check all subscription kinds and classify the user.
///
/// The three kinds are read concurrently; classification follows
/// [`SubscriptionKind::PRIORITY`].
pub async fn check_subscription_capability(
    source: &dyn SubscriptionSource,
    user_id: &str,
    now: DateTime<Utc>,
) -> SubscriptionCapability {
    let (seller, affiliate, tip) = tokio::join!(
        read_subscription(source, user_id, SubscriptionKind::Seller),
        read_subscription(source, user_id, SubscriptionKind::Affiliate),
        read_subscription(source, user_id, SubscriptionKind::Tip),
    );

    let observed = seller.is_ok() && affiliate.is_ok() && tip.is_ok();
    let rows: Vec<SubscriptionRecord> = [seller, affiliate, tip]
        .into_iter()
        .filter_map(|read| read.ok().flatten())
        .collect();

    let kind = SubscriptionKind::PRIORITY.into_iter().find(|kind| {
        rows.iter()
            .any(|row| row.kind == *kind && row.is_active_at(now))
    });

    let status = if kind.is_some() {
        SubscriptionStatus::Active
    } else if !rows.is_empty() {
        SubscriptionStatus::Expired
    } else {
        SubscriptionStatus::None
    };

    debug!(user_id, ?kind, ?status, "Subscription capability checked");

    SubscriptionCapability {
        kind,
        status,
        observed,
    }
}

async fn read_subscription(
    source: &dyn SubscriptionSource,
    user_id: &str,
    kind: SubscriptionKind,
) -> Result<Option<SubscriptionRecord>, ()> {
    match source.find_subscription(user_id, kind).await {
        // A source returning a row of a different kind is treated as no row
        Ok(row) => Ok(row.filter(|r| r.kind == kind)),
        Err(e) => {
            warn!(user_id, %kind, "Subscription lookup failed, treating as absent: {}", e);
            Err(())
        }
    }
}

/// KYC is verified when the status is approved and a verification time exists
pub async fn check_kyc_capability(source: &dyn ProfileSource, user_id: &str) -> KycCapability {
    match read_profile(source, user_id, "kyc").await {
        Some(profile) => {
            let approved = profile
                .as_ref()
                .and_then(|p| p.kyc_status.as_deref())
                .map_or(false, |s| s.eq_ignore_ascii_case(KYC_APPROVED));
            let timestamped = profile
                .as_ref()
                .map_or(false, |p| p.kyc_verified_at.is_some());
            KycCapability {
                verified: approved && timestamped,
                observed: true,
            }
        }
        None => KycCapability {
            verified: false,
            observed: false,
        },
    }
}

/// Risk score, defaulting to [`DEFAULT_RISK_SCORE`]
pub async fn check_risk_capability(source: &dyn ProfileSource, user_id: &str) -> RiskCapability {
    match read_profile(source, user_id, "risk").await {
        Some(profile) => {
            let score = profile
                .and_then(|p| p.risk_score)
                .unwrap_or(DEFAULT_RISK_SCORE);
            RiskCapability::from_score(score, true)
        }
        None => RiskCapability::from_score(DEFAULT_RISK_SCORE, false),
    }
}

/// Reputation score, defaulting to [`DEFAULT_REPUTATION_SCORE`]
pub async fn check_reputation_capability(
    source: &dyn ProfileSource,
    user_id: &str,
) -> ReputationCapability {
    match read_profile(source, user_id, "reputation").await {
        Some(profile) => {
            let score = profile
                .and_then(|p| p.reputation_score)
                .unwrap_or(DEFAULT_REPUTATION_SCORE);
            ReputationCapability::from_score(score, true)
        }
        None => ReputationCapability::from_score(DEFAULT_REPUTATION_SCORE, false),
    }
}

/// `None` when the read failed, `Some(None)` when no profile exists
async fn read_profile(
    source: &dyn ProfileSource,
    user_id: &str,
    probe: &'static str,
) -> Option<Option<ProfileRecord>> {
    match source.find_profile(user_id).await {
        Ok(profile) => Some(profile.map(ProfileRecord::sanitized)),
        Err(e) => {
            warn!(user_id, probe, "Profile lookup failed, using defaults: {}", e);
            None
        }
    }
}
