//! Attestation signing and verification (RSA-SHA256)
//!
//! Signatures cover [`signing_input`] and are encoded as standard base64.
//! Without a private key the signer emits the [`UNSIGNED`] sentinel, which
//! every verifier rejects explicitly.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{crypto, Algorithm, DecodingKey, EncodingKey};
use tracing::{debug, error};

use super::proof::signing_input;
use crate::config::PlatformKeys;
use crate::logging::{ArtifactKind, AuditLogger};
use crate::types::{CapabilityError, Result};
use crate::verification::{VerificationFailure, VerificationResult};

/// Signature value used when no private key is configured
pub const UNSIGNED: &str = "UNSIGNED";

/// Sign `(hash_proof, resolved_at)` with an RSA key, returning base64.
pub fn sign_attestation(hash_proof: &str, resolved_at: &str, key: &EncodingKey) -> Result<String> {
    let message = signing_input(hash_proof, resolved_at);
    let signature = crypto::sign(message.as_bytes(), key, Algorithm::RS256)?;

    // jsonwebtoken hands back base64url; attestations use standard base64
    let raw = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| CapabilityError::Signing(format!("Signature encoding: {}", e)))?;
    Ok(STANDARD.encode(raw))
}

/// Produces attestation signatures, or the sentinel when unkeyed
#[derive(Clone)]
pub struct AttestationSigner {
    key: Option<EncodingKey>,
}

impl AttestationSigner {
    pub fn new(keys: &PlatformKeys) -> Self {
        Self {
            key: keys.signing_key().cloned(),
        }
    }

    /// A signer that always produces [`UNSIGNED`]
    pub fn unsigned() -> Self {
        Self { key: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Sign, degrading to [`UNSIGNED`] instead of failing
    pub fn sign(&self, hash_proof: &str, resolved_at: &str) -> String {
        let Some(key) = self.key.as_ref() else {
            debug!(hash_proof, "No signing key, attestation left UNSIGNED");
            return UNSIGNED.to_string();
        };

        match sign_attestation(hash_proof, resolved_at, key) {
            Ok(signature) => signature,
            Err(e) => {
                error!(hash_proof, "Attestation signing failed, left UNSIGNED: {}", e);
                UNSIGNED.to_string()
            }
        }
    }
}

impl std::fmt::Debug for AttestationSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationSigner")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Checks attestation signatures against the platform public key
#[derive(Clone)]
pub struct AttestationVerifier {
    key: DecodingKey,
    pub(crate) audit: AuditLogger,
}

impl AttestationVerifier {
    /// Fails with a configuration error when no public key is available
    pub fn new(keys: &PlatformKeys) -> Result<Self> {
        Ok(Self {
            key: keys.verifying_key()?.clone(),
            audit: AuditLogger::new(),
        })
    }

    /// Send security events to `audit`
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Verify a signature over `(hash_proof, resolved_at)`.
    ///
    /// This proves the platform attested to *some* hash at that time; it says
    /// nothing about content unless the caller recomputes the hash itself
    /// (see [`AttestationVerifier::verify_capability_snapshot`]).
    pub fn verify_attestation_signature(
        &self,
        hash_proof: &str,
        resolved_at: &str,
        signature: &str,
    ) -> VerificationResult {
        let result = self.check_signature(hash_proof, resolved_at, signature);
        if let Some(failure) = &result.error {
            self.audit
                .record_failure(failure, ArtifactKind::Signature, |e| e.with_reference(hash_proof));
        }
        result
    }

    pub(crate) fn check_signature(
        &self,
        hash_proof: &str,
        resolved_at: &str,
        signature: &str,
    ) -> VerificationResult {
        if signature == UNSIGNED {
            return VerificationResult::invalid(VerificationFailure::Unsigned);
        }

        let raw = match STANDARD.decode(signature.trim()) {
            Ok(raw) if !raw.is_empty() => raw,
            Ok(_) => {
                return VerificationResult::invalid(VerificationFailure::Malformed(
                    "empty signature".into(),
                ))
            }
            Err(e) => {
                return VerificationResult::invalid(VerificationFailure::Malformed(format!(
                    "signature is not base64: {}",
                    e
                )))
            }
        };

        let message = signing_input(hash_proof, resolved_at);
        match crypto::verify(
            &URL_SAFE_NO_PAD.encode(raw),
            message.as_bytes(),
            &self.key,
            Algorithm::RS256,
        ) {
            Ok(true) => VerificationResult::valid(),
            Ok(false) => VerificationResult::invalid(VerificationFailure::InvalidSignature),
            Err(e) => {
                debug!("Signature verification error: {}", e);
                VerificationResult::invalid(VerificationFailure::InvalidSignature)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_PEM: &str = include_str!("../../tests/fixtures/platform_private.pem");
    const PUBLIC_PEM: &str = include_str!("../../tests/fixtures/platform_public.pem");
    const ROGUE_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/rogue_private.pem");

    const HASH: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
    const AT: &str = "2024-03-01T10:00:00.000Z";

    fn keys() -> PlatformKeys {
        PlatformKeys::from_pem(Some(PRIVATE_PEM), Some(PUBLIC_PEM))
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = keys();
        let signature = AttestationSigner::new(&keys).sign(HASH, AT);
        assert_ne!(signature, UNSIGNED);
        assert!(STANDARD.decode(&signature).is_ok());

        let verifier = AttestationVerifier::new(&keys).unwrap();
        assert!(verifier.verify_attestation_signature(HASH, AT, &signature).valid);
    }

    #[test]
    fn test_signature_deterministic() {
        let signer = AttestationSigner::new(&keys());
        assert_eq!(signer.sign(HASH, AT), signer.sign(HASH, AT));
    }

    #[test]
    fn test_unsigned_without_key() {
        let keys = PlatformKeys::from_pem(None, Some(PUBLIC_PEM));
        let signer = AttestationSigner::new(&keys);
        assert!(!signer.is_enabled());
        assert_eq!(signer.sign(HASH, AT), UNSIGNED);
    }

    #[test]
    fn test_unsigned_sentinel_rejected_explicitly() {
        let audit = AuditLogger::new();
        let verifier = AttestationVerifier::new(&keys()).unwrap().with_audit(audit.clone());

        let result = verifier.verify_attestation_signature(HASH, AT, UNSIGNED);
        assert!(!result.valid);
        assert_eq!(result.error, Some(VerificationFailure::Unsigned));
        assert_eq!(audit.recorded(), 1);
    }

    #[test]
    fn test_foreign_key_rejected() {
        let rogue = PlatformKeys::from_pem(Some(ROGUE_PRIVATE_PEM), None);
        let forged = AttestationSigner::new(&rogue).sign(HASH, AT);

        let result = AttestationVerifier::new(&keys())
            .unwrap()
            .verify_attestation_signature(HASH, AT, &forged);
        assert_eq!(result.error, Some(VerificationFailure::InvalidSignature));
    }

    #[test]
    fn test_garbage_signature_is_malformed() {
        let verifier = AttestationVerifier::new(&keys()).unwrap();
        let result = verifier.verify_attestation_signature(HASH, AT, "***not base64***");
        assert!(matches!(result.error, Some(VerificationFailure::Malformed(_))));

        let empty = verifier.verify_attestation_signature(HASH, AT, "");
        assert!(matches!(empty.error, Some(VerificationFailure::Malformed(_))));
    }

    #[test]
    fn test_verifier_requires_public_key() {
        let keys = PlatformKeys::from_pem(Some(PRIVATE_PEM), None);
        let err = AttestationVerifier::new(&keys).err().unwrap();
        assert!(err.is_config());
    }
}
