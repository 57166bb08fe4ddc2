//! RS256 token codec built on `jsonwebtoken`
//!
//! The algorithm is pinned: a token whose header names anything other than
//! RS256 is rejected before any signature check. Expiry is checked by this
//! codec against the caller's clock, with no leeway.

use std::collections::HashSet;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use super::{MonetizationTokenPayload, TokenCodec, TokenValidationResult};
use crate::config::PlatformKeys;
use crate::logging::{ArtifactKind, AuditLogger};
use crate::types::{CapabilityError, Result};
use crate::verification::VerificationFailure;

/// RS256 monetization token codec
#[derive(Clone)]
pub struct Rs256TokenCodec {
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
    audit: AuditLogger,
}

impl Rs256TokenCodec {
    /// Requires the public key; issuing additionally requires the private key
    pub fn new(keys: &PlatformKeys) -> Result<Self> {
        Ok(Self {
            encoding: keys.signing_key().cloned(),
            decoding: keys.verifying_key()?.clone(),
            audit: AuditLogger::new(),
        })
    }

    /// Send security events to `audit`
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);
        validation
    }

    fn verify(&self, token: &str, now: i64) -> TokenValidationResult {
        let parts = token.split('.').count();
        if parts != 3 {
            return TokenValidationResult::invalid(VerificationFailure::Malformed(format!(
                "expected 3 token parts, found {}",
                parts
            )));
        }

        match decode::<MonetizationTokenPayload>(token, &self.decoding, &Self::validation()) {
            Ok(data) if data.claims.is_expired_at(now) => {
                TokenValidationResult::invalid(VerificationFailure::Expired)
            }
            Ok(data) => TokenValidationResult::valid(data.claims),
            Err(err) => {
                debug!("Token rejected: {}", err);
                let failure = match err.kind() {
                    ErrorKind::InvalidSignature => VerificationFailure::InvalidSignature,
                    ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                        VerificationFailure::AlgorithmMismatch
                    }
                    _ => VerificationFailure::Malformed(err.to_string()),
                };
                TokenValidationResult::invalid(failure)
            }
        }
    }
}

impl TokenCodec for Rs256TokenCodec {
    fn encode(&self, payload: &MonetizationTokenPayload) -> Result<String> {
        let key = self.encoding.as_ref().ok_or_else(|| {
            CapabilityError::Config("Cannot issue tokens without a platform private key".into())
        })?;

        encode(&Header::new(Algorithm::RS256), payload, key)
            .map_err(|e| CapabilityError::Signing(format!("Failed to generate token: {}", e)))
    }

    fn decode_at(&self, token: &str, now: i64) -> TokenValidationResult {
        let result = self.verify(token, now);
        if let Some(failure) = &result.error {
            // Fingerprint only; never log the bearer credential itself
            let fingerprint = crate::attestation::proof::sha256_hex(token.as_bytes());
            self.audit.record_failure(failure, ArtifactKind::Token, |e| {
                e.with_reference(&fingerprint[..16])
            });
        }
        result
    }
}

impl std::fmt::Debug for Rs256TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rs256TokenCodec")
            .field("can_issue", &self.encoding.is_some())
            .finish()
    }
}
