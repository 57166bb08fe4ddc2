//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mcre::facts::{InMemoryFactStore, ProfileRecord, SubscriptionKind, SubscriptionRecord};
use mcre::{CapabilityEngine, PlatformKeys};

pub const PRIVATE_PEM: &str = include_str!("../fixtures/platform_private.pem");
pub const PUBLIC_PEM: &str = include_str!("../fixtures/platform_public.pem");
pub const ROGUE_PRIVATE_PEM: &str = include_str!("../fixtures/rogue_private.pem");

pub fn platform_keys() -> PlatformKeys {
    PlatformKeys::from_pem(Some(PRIVATE_PEM), Some(PUBLIC_PEM))
}

/// Fixed resolution time used across scenarios
pub fn trusted_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

pub fn active(kind: SubscriptionKind) -> SubscriptionRecord {
    SubscriptionRecord::new(kind, "active", Some(trusted_time() + Duration::days(30)))
}

pub fn lapsed(kind: SubscriptionKind) -> SubscriptionRecord {
    SubscriptionRecord::new(kind, "active", Some(trusted_time() - Duration::days(1)))
}

pub fn profile(kyc_approved: bool, risk: f64, reputation: f64) -> ProfileRecord {
    ProfileRecord {
        kyc_status: Some(if kyc_approved { "approved" } else { "pending" }.to_string()),
        kyc_verified_at: kyc_approved.then(|| trusted_time() - Duration::days(90)),
        risk_score: Some(risk),
        reputation_score: Some(reputation),
    }
}

pub fn engine(store: Arc<InMemoryFactStore>) -> CapabilityEngine {
    CapabilityEngine::new(store, &platform_keys())
}
