//! Resolved capability snapshots
//!
//! A snapshot is built once per resolution and never mutated. Its
//! `hashProof` and `attestationSignature` are always derived from the other
//! fields at construction; the fields are private so they cannot drift.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::proof::hash_proof;
use super::signer::{AttestationSigner, AttestationVerifier, UNSIGNED};
use crate::logging::ArtifactKind;
use crate::resolver::{CapabilityState, Resolution, ResolutionContext, ResolutionSource};
use crate::types::Result;
use crate::verification::{VerificationFailure, VerificationResult};

/// Format a resolution timestamp (ISO-8601, millisecond precision, `Z`)
pub fn format_resolved_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The attested record of one capability resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCapabilitySnapshot {
    resolution_id: String,
    user_id: String,
    resolved_at: String,
    capability_state: CapabilityState,
    resolution_context: ResolutionContext,
    resolution_source: ResolutionSource,
    hash_proof: String,
    attestation_signature: String,
}

impl ResolvedCapabilitySnapshot {
    /// Hash and sign a resolution
    pub fn attest(
        resolution_id: String,
        user_id: String,
        resolved_at: DateTime<Utc>,
        resolution: Resolution,
        signer: &AttestationSigner,
    ) -> Result<Self> {
        let resolved_at = format_resolved_at(resolved_at);
        let proof = hash_proof(
            &resolution_id,
            &user_id,
            &resolved_at,
            &resolution.state,
            &resolution.context,
        )?;
        let attestation_signature = signer.sign(&proof, &resolved_at);

        Ok(Self {
            resolution_id,
            user_id,
            resolved_at,
            capability_state: resolution.state,
            resolution_context: resolution.context,
            resolution_source: resolution.source,
            hash_proof: proof,
            attestation_signature,
        })
    }

    pub fn resolution_id(&self) -> &str {
        &self.resolution_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn resolved_at(&self) -> &str {
        &self.resolved_at
    }

    /// Parsed `resolved_at`, `None` if it is not valid RFC 3339
    pub fn resolved_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.resolved_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn capability_state(&self) -> &CapabilityState {
        &self.capability_state
    }

    pub fn resolution_context(&self) -> &ResolutionContext {
        &self.resolution_context
    }

    pub fn resolution_source(&self) -> &ResolutionSource {
        &self.resolution_source
    }

    pub fn hash_proof(&self) -> &str {
        &self.hash_proof
    }

    pub fn attestation_signature(&self) -> &str {
        &self.attestation_signature
    }

    pub fn is_signed(&self) -> bool {
        self.attestation_signature != UNSIGNED
    }

    /// Recompute the hash proof from this snapshot's own fields
    pub fn recompute_hash_proof(&self) -> Result<String> {
        hash_proof(
            &self.resolution_id,
            &self.user_id,
            &self.resolved_at,
            &self.capability_state,
            &self.resolution_context,
        )
    }
}

impl AttestationVerifier {
    /// Verify a snapshot's content and signature.
    ///
    /// The hash proof is recomputed from the snapshot's fields and must match
    /// the claimed one before the signature is checked, so a valid result
    /// authenticates the capability state and context themselves.
    pub fn verify_capability_snapshot(
        &self,
        snapshot: &ResolvedCapabilitySnapshot,
    ) -> VerificationResult {
        let result = self.check_snapshot(snapshot);
        if let Some(failure) = &result.error {
            self.audit.record_failure(failure, ArtifactKind::Snapshot, |e| {
                e.with_user(snapshot.user_id())
                    .with_resolution(snapshot.resolution_id())
                    .with_reference(snapshot.hash_proof())
            });
        }
        result
    }

    fn check_snapshot(&self, snapshot: &ResolvedCapabilitySnapshot) -> VerificationResult {
        if !snapshot.is_signed() {
            return VerificationResult::invalid(VerificationFailure::Unsigned);
        }

        match snapshot.recompute_hash_proof() {
            Ok(recomputed) if recomputed == snapshot.hash_proof => {}
            Ok(_) => return VerificationResult::invalid(VerificationFailure::HashMismatch),
            Err(e) => {
                return VerificationResult::invalid(VerificationFailure::Malformed(e.to_string()))
            }
        }

        self.check_signature(
            &snapshot.hash_proof,
            &snapshot.resolved_at,
            &snapshot.attestation_signature,
        )
    }
}

/// Caller-side recency policy for snapshots.
///
/// Snapshots never expire on their own; payout flows decide how old an
/// attestation they accept.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotFreshness {
    max_age: Duration,
}

impl SnapshotFreshness {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    /// Resolved no more than `max_age` before `now`, and not in the future
    pub fn is_fresh(&self, snapshot: &ResolvedCapabilitySnapshot, now: DateTime<Utc>) -> bool {
        match snapshot.resolved_at_time() {
            Some(resolved_at) => {
                let age = now - resolved_at;
                age >= Duration::zero() && age <= self.max_age
            }
            None => false,
        }
    }
}
