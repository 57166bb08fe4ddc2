//! Attestation and snapshot verification against real platform keys

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{active, engine, platform_keys, profile, trusted_time, PUBLIC_PEM, ROGUE_PRIVATE_PEM};
use mcre::attestation::{hash_proof, SnapshotFreshness, UNSIGNED};
use mcre::canonical::stable_stringify;
use mcre::facts::{InMemoryFactStore, SubscriptionKind};
use mcre::logging::AuditLogger;
use mcre::{
    AttestationSigner, AttestationVerifier, CapabilityEngine, PlatformKeys,
    ResolvedCapabilitySnapshot, ResolveOptions, VerificationFailure,
};

async fn seller_snapshot() -> ResolvedCapabilitySnapshot {
    let store = Arc::new(InMemoryFactStore::new());
    store.put_subscription("seller-1", active(SubscriptionKind::Seller));
    store.put_profile("seller-1", profile(true, 0.2, 0.5));

    engine(store)
        .resolve_user_capabilities("seller-1", ResolveOptions::at(trusted_time()))
        .await
        .unwrap()
}

fn verifier() -> AttestationVerifier {
    AttestationVerifier::new(&PlatformKeys::from_pem(None, Some(PUBLIC_PEM))).unwrap()
}

fn flip_first_char(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    chars[0] = if chars[0] == 'a' { 'b' } else { 'a' };
    chars.into_iter().collect()
}

#[tokio::test]
async fn signature_verifies_with_public_key_only() {
    let snapshot = seller_snapshot().await;

    let result = verifier().verify_attestation_signature(
        snapshot.hash_proof(),
        snapshot.resolved_at(),
        snapshot.attestation_signature(),
    );
    assert!(result.valid);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn altered_hash_or_time_fails_signature() {
    let snapshot = seller_snapshot().await;
    let verifier = verifier();

    let result = verifier.verify_attestation_signature(
        &flip_first_char(snapshot.hash_proof()),
        snapshot.resolved_at(),
        snapshot.attestation_signature(),
    );
    assert_eq!(result.error, Some(VerificationFailure::InvalidSignature));

    let result = verifier.verify_attestation_signature(
        snapshot.hash_proof(),
        "2024-03-01T10:00:00.001Z",
        snapshot.attestation_signature(),
    );
    assert_eq!(result.error, Some(VerificationFailure::InvalidSignature));
}

#[tokio::test]
async fn snapshot_verifies_end_to_end() {
    let snapshot = seller_snapshot().await;
    assert_eq!(snapshot.recompute_hash_proof().unwrap(), snapshot.hash_proof());
    assert!(verifier().verify_capability_snapshot(&snapshot).valid);
}

#[tokio::test]
async fn snapshot_survives_json_round_trip() {
    let snapshot = seller_snapshot().await;
    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: ResolvedCapabilitySnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, snapshot);
    assert!(verifier().verify_capability_snapshot(&restored).valid);
}

#[tokio::test]
async fn elevated_capabilities_detected_as_hash_mismatch() {
    let snapshot = seller_snapshot().await;
    let mut value = serde_json::to_value(&snapshot).unwrap();
    value["capabilityState"]["canReceiveTips"] = true.into();
    let tampered: ResolvedCapabilitySnapshot = serde_json::from_value(value).unwrap();

    let audit = AuditLogger::new();
    let result = verifier()
        .with_audit(audit.clone())
        .verify_capability_snapshot(&tampered);
    assert_eq!(result.error, Some(VerificationFailure::HashMismatch));
    assert_eq!(audit.recorded(), 1);
}

#[tokio::test]
async fn rehashed_tampering_still_fails_signature() {
    let snapshot = seller_snapshot().await;
    let mut value = serde_json::to_value(&snapshot).unwrap();
    value["resolutionContext"]["riskScore"] = 0.95.into();
    value["capabilityState"]["payoutRoutingEnabled"] = false.into();

    // Attacker recomputes a consistent hash but cannot re-sign it
    let partial: ResolvedCapabilitySnapshot = serde_json::from_value(value.clone()).unwrap();
    value["hashProof"] = partial.recompute_hash_proof().unwrap().into();
    let tampered: ResolvedCapabilitySnapshot = serde_json::from_value(value).unwrap();

    let result = verifier().verify_capability_snapshot(&tampered);
    assert_eq!(result.error, Some(VerificationFailure::InvalidSignature));
}

#[tokio::test]
async fn unsigned_snapshot_rejected_and_audited() {
    let store = Arc::new(InMemoryFactStore::new());
    store.put_subscription("u1", active(SubscriptionKind::Seller));
    let engine = CapabilityEngine::with_sources(store.clone(), store, AttestationSigner::unsigned());
    assert!(!engine.signing_enabled());

    let snapshot = engine
        .resolve_user_capabilities("u1", ResolveOptions::at(trusted_time()))
        .await
        .unwrap();
    assert_eq!(snapshot.attestation_signature(), UNSIGNED);
    assert!(!snapshot.is_signed());

    let audit = AuditLogger::new();
    let verifier = verifier().with_audit(audit.clone());
    let result = verifier.verify_capability_snapshot(&snapshot);
    assert_eq!(result.error, Some(VerificationFailure::Unsigned));

    let result =
        verifier.verify_attestation_signature(snapshot.hash_proof(), snapshot.resolved_at(), UNSIGNED);
    assert!(!result.valid);
    assert_eq!(audit.recorded(), 2);
}

#[tokio::test]
async fn rogue_key_signature_rejected() {
    let store = Arc::new(InMemoryFactStore::new());
    store.put_subscription("u1", active(SubscriptionKind::Tip));
    let rogue_keys = PlatformKeys::from_pem(Some(ROGUE_PRIVATE_PEM), None);
    let engine = CapabilityEngine::new(store, &rogue_keys);

    let snapshot = engine
        .resolve_user_capabilities("u1", ResolveOptions::at(trusted_time()))
        .await
        .unwrap();
    assert!(snapshot.is_signed());

    let result = verifier().verify_capability_snapshot(&snapshot);
    assert_eq!(result.error, Some(VerificationFailure::InvalidSignature));
}

#[test]
fn hash_proof_ignores_key_order() {
    let a: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":{"y":true,"x":"s"}}"#).unwrap();
    let b: serde_json::Value = serde_json::from_str(r#"{"a":{"x":"s","y":true},"b":1}"#).unwrap();
    assert_eq!(stable_stringify(&a), stable_stringify(&b));

    let snapshot_state = mcre::CapabilityState {
        can_monetize: true,
        can_create_products: true,
        ..Default::default()
    };
    let context = mcre::ResolutionContext {
        subscription_type: Some(SubscriptionKind::Seller),
        subscription_status: mcre::facts::SubscriptionStatus::Active,
        risk_score: 0.2,
        reputation_score: 0.5,
        kyc_verified: true,
        region_compliance: true,
        ai_inference_result_hash: None,
    };
    let first = hash_proof("r1", "u1", "2024-03-01T10:00:00.000Z", &snapshot_state, &context).unwrap();
    let second = hash_proof("r1", "u1", "2024-03-01T10:00:00.000Z", &snapshot_state, &context).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 64);
}

#[tokio::test]
async fn freshness_window_applied_by_caller() {
    let snapshot = seller_snapshot().await;
    let policy = SnapshotFreshness::new(Duration::minutes(15));

    assert!(policy.is_fresh(&snapshot, trusted_time() + Duration::minutes(10)));
    assert!(!policy.is_fresh(&snapshot, trusted_time() + Duration::minutes(16)));
    assert!(!policy.is_fresh(&snapshot, trusted_time() - Duration::minutes(1)));
}

#[test]
fn verifier_requires_public_key() {
    assert!(AttestationVerifier::new(&PlatformKeys::none()).is_err());
    assert!(AttestationVerifier::new(&platform_keys()).is_ok());
}
