//! Hash proof construction
//!
//! ```text
//! payload   = DOMAIN_SEPARATOR|resolutionId|userId|resolvedAt|canon(state)|canon(context)
//! hashProof = hex(sha256(payload))
//! signed    = DOMAIN_SEPARATOR|hashProof|resolvedAt
//! ```

use sha2::{Digest, Sha256};

use crate::canonical::stable_stringify_serialize;
use crate::resolver::{CapabilityState, ResolutionContext};
use crate::types::Result;

/// Protocol tag prefixed to all hashed and signed material
pub const DOMAIN_SEPARATOR: &str = "MCRE-CAPABILITY-ATTESTATION-V1";

const FIELD_SEPARATOR: &str = "|";

/// Build the canonical payload a hash proof commits to
pub fn canonical_payload(
    resolution_id: &str,
    user_id: &str,
    resolved_at: &str,
    state: &CapabilityState,
    context: &ResolutionContext,
) -> Result<String> {
    let state = stable_stringify_serialize(state)?;
    let context = stable_stringify_serialize(context)?;

    Ok([
        DOMAIN_SEPARATOR,
        resolution_id,
        user_id,
        resolved_at,
        state.as_str(),
        context.as_str(),
    ]
    .join(FIELD_SEPARATOR))
}

/// Hex SHA-256 of the canonical payload
pub fn hash_proof(
    resolution_id: &str,
    user_id: &str,
    resolved_at: &str,
    state: &CapabilityState,
    context: &ResolutionContext,
) -> Result<String> {
    let payload = canonical_payload(resolution_id, user_id, resolved_at, state, context)?;
    Ok(sha256_hex(payload.as_bytes()))
}

/// Material covered by the attestation signature
pub fn signing_input(hash_proof: &str, resolved_at: &str) -> String {
    [DOMAIN_SEPARATOR, hash_proof, resolved_at].join(FIELD_SEPARATOR)
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{SubscriptionKind, SubscriptionStatus};

    fn context() -> ResolutionContext {
        ResolutionContext {
            subscription_type: Some(SubscriptionKind::Seller),
            subscription_status: SubscriptionStatus::Active,
            risk_score: 0.2,
            reputation_score: 0.5,
            kyc_verified: true,
            region_compliance: true,
            ai_inference_result_hash: None,
        }
    }

    fn state() -> CapabilityState {
        CapabilityState {
            can_monetize: true,
            can_create_products: true,
            payout_routing_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_canonical_payload_layout() {
        let payload = canonical_payload("res-1", "user-1", "2024-01-01T00:00:00.000Z", &state(), &context())
            .unwrap();
        let expected = concat!(
            "MCRE-CAPABILITY-ATTESTATION-V1|res-1|user-1|2024-01-01T00:00:00.000Z|",
            r#"{"canCreateProducts":true,"canMonetize":true,"canReceiveAffiliateCommission":false,"canReceiveTips":false,"payoutRoutingEnabled":true}|"#,
            r#"{"aiInferenceResultHash":null,"kycVerified":true,"regionCompliance":true,"reputationScore":0.5,"riskScore":0.2,"subscriptionStatus":"active","subscriptionType":"seller"}"#,
        );
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_hash_proof_deterministic() {
        let a = hash_proof("res-1", "user-1", "t", &state(), &context()).unwrap();
        let b = hash_proof("res-1", "user-1", "t", &state(), &context()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hash_proof_binds_every_field() {
        let base = hash_proof("res-1", "user-1", "t", &state(), &context()).unwrap();
        assert_ne!(base, hash_proof("res-2", "user-1", "t", &state(), &context()).unwrap());
        assert_ne!(base, hash_proof("res-1", "user-2", "t", &state(), &context()).unwrap());
        assert_ne!(base, hash_proof("res-1", "user-1", "u", &state(), &context()).unwrap());

        let mut altered = context();
        altered.risk_score = 0.21;
        assert_ne!(base, hash_proof("res-1", "user-1", "t", &state(), &altered).unwrap());
    }

    #[test]
    fn test_signing_input() {
        assert_eq!(
            signing_input("abc", "2024-01-01T00:00:00.000Z"),
            "MCRE-CAPABILITY-ATTESTATION-V1|abc|2024-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
