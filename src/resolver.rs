//! Capability resolution
//!
//! Pure combination of probe outputs into capability booleans plus the
//! evidentiary context. No I/O happens here.
//!
//! ## Policy
//!
//! | Capability | Rule |
//! |---|---|
//! | `canMonetize` | any subscription kind active |
//! | `canReceiveTips` | active kind is `tip` |
//! | `canCreateProducts` | active kind is `seller` |
//! | `canReceiveAffiliateCommission` | active kind is `affiliate` |
//! | `payoutRoutingEnabled` | `canMonetize` and risk acceptable and region compliant |
//!
//! KYC and reputation are recorded in the context and source flags but gate
//! nothing. That is the current policy, kept deliberately; changing it is a
//! product decision.

use serde::{Deserialize, Serialize};

use crate::facts::{
    KycCapability, ReputationCapability, RiskCapability, SubscriptionCapability, SubscriptionKind,
    SubscriptionStatus,
};

/// Derived monetization permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityState {
    pub can_monetize: bool,
    pub can_receive_tips: bool,
    pub can_create_products: bool,
    pub can_receive_affiliate_commission: bool,
    pub payout_routing_enabled: bool,
}

/// Raw signals the decision was made from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionContext {
    pub subscription_type: Option<SubscriptionKind>,
    pub subscription_status: SubscriptionStatus,
    pub risk_score: f64,
    pub reputation_score: f64,
    pub kyc_verified: bool,
    pub region_compliance: bool,
    pub ai_inference_result_hash: Option<String>,
}

/// Which checks produced a reading, regardless of outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionSource {
    pub subscription: bool,
    pub kyc: bool,
    pub risk: bool,
    pub reputation: bool,
    pub ai_inference: bool,
}

/// Everything the probes gathered for one user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactSignals {
    pub subscription: SubscriptionCapability,
    pub kyc: KycCapability,
    pub risk: RiskCapability,
    pub reputation: ReputationCapability,
    pub region_compliant: bool,
}

/// Resolver output
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub state: CapabilityState,
    pub context: ResolutionContext,
    pub source: ResolutionSource,
}

/// Subset of the state for low-stakes checks that need no proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimalCapabilities {
    pub can_monetize: bool,
    pub payout_routing_enabled: bool,
}

impl From<CapabilityState> for MinimalCapabilities {
    fn from(state: CapabilityState) -> Self {
        Self {
            can_monetize: state.can_monetize,
            payout_routing_enabled: state.payout_routing_enabled,
        }
    }
}

/// Combine probe outputs into a capability decision.
///
/// `ai_inference_result_hash` is carried into the context verbatim and marks
/// the AI inference source when present.
pub fn resolve_capabilities(
    signals: &FactSignals,
    ai_inference_result_hash: Option<String>,
) -> Resolution {
    let active_kind = signals.subscription.kind;
    let can_monetize = active_kind.is_some();

    let state = CapabilityState {
        can_monetize,
        can_receive_tips: active_kind == Some(SubscriptionKind::Tip),
        can_create_products: active_kind == Some(SubscriptionKind::Seller),
        can_receive_affiliate_commission: active_kind == Some(SubscriptionKind::Affiliate),
        payout_routing_enabled: can_monetize
            && signals.risk.acceptable
            && signals.region_compliant,
    };

    let source = ResolutionSource {
        subscription: signals.subscription.observed,
        kyc: signals.kyc.observed,
        risk: signals.risk.observed,
        reputation: signals.reputation.observed,
        ai_inference: ai_inference_result_hash.is_some(),
    };

    let context = ResolutionContext {
        subscription_type: active_kind,
        subscription_status: signals.subscription.status,
        risk_score: signals.risk.score,
        reputation_score: signals.reputation.score,
        kyc_verified: signals.kyc.verified,
        region_compliance: signals.region_compliant,
        ai_inference_result_hash,
    };

    Resolution {
        state,
        context,
        source,
    }
}
