//! mcre - Monetization Capability Resolution & Attestation Engine
//!
//! Decides whether a user may currently monetize (tips, products, affiliate
//! commission), records that decision as a hash-proofed, RSA-signed
//! snapshot, and re-verifies snapshots and bearer tokens later without the
//! original facts.
//!
//! ## Pipeline
//!
//! - **Facts**: subscription, KYC, risk and reputation probes (concurrent)
//! - **Resolver**: pure policy over the probe outputs
//! - **Attestation**: canonical payload, SHA-256 hash proof, RS256 signature
//! - **Token**: compact RS256 bearer token derived from a snapshot
//! - **Verification**: signature, snapshot and token checks at payout time

pub mod attestation;
pub mod canonical;
pub mod config;
pub mod db;
pub mod engine;
pub mod facts;
pub mod logging;
pub mod resolver;
pub mod token;
pub mod types;
pub mod verification;

pub use attestation::{AttestationSigner, AttestationVerifier, ResolvedCapabilitySnapshot};
pub use config::{Args, PlatformKeys};
pub use engine::{CapabilityEngine, ResolveOptions};
pub use resolver::{CapabilityState, MinimalCapabilities, ResolutionContext, ResolutionSource};
pub use token::{MonetizationTokenPayload, Rs256TokenCodec, TokenCodec, TokenValidationResult};
pub use types::{CapabilityError, Result};
pub use verification::{VerificationFailure, VerificationResult};
