//! Capability attestation
//!
//! Provides:
//! - Hash proofs over the canonical decision payload
//! - RSA-SHA256 attestation signing with an `UNSIGNED` fallback
//! - Signature and snapshot verification against the platform public key

pub mod proof;
pub mod signer;
pub mod snapshot;

pub use proof::{canonical_payload, hash_proof, signing_input, DOMAIN_SEPARATOR};
pub use signer::{sign_attestation, AttestationSigner, AttestationVerifier, UNSIGNED};
pub use snapshot::{format_resolved_at, ResolvedCapabilitySnapshot, SnapshotFreshness};
