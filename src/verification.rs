//! Verification outcomes
//!
//! Verification failure is an expected outcome, not an error, so verifiers
//! return these result values instead of `Err`.

use serde::{Deserialize, Serialize};

/// Why an attestation or token was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum VerificationFailure {
    /// Wrong shape, undecodable base64 or JSON
    #[error("Malformed: {0}")]
    Malformed(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    /// The `UNSIGNED` sentinel was presented as proof
    #[error("Attestation is unsigned")]
    Unsigned,

    /// Claimed hash proof does not match the snapshot contents
    #[error("Hash proof mismatch")]
    HashMismatch,

    /// Token header names an algorithm other than RS256
    #[error("Algorithm mismatch")]
    AlgorithmMismatch,
}

impl VerificationFailure {
    /// Failures that indicate tampering or forgery and must be audited
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature | Self::Unsigned | Self::HashMismatch | Self::AlgorithmMismatch
        )
    }
}

/// Result of verifying an attestation signature or snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub error: Option<VerificationFailure>,
}

impl VerificationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(failure: VerificationFailure) -> Self {
        Self {
            valid: false,
            error: Some(failure),
        }
    }

    /// Human-readable error message, if any
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(VerificationFailure::Expired.to_string(), "Token expired");
        assert_eq!(VerificationFailure::InvalidSignature.to_string(), "Invalid signature");
        assert_eq!(
            VerificationResult::invalid(VerificationFailure::Expired).error_message(),
            Some("Token expired".to_string())
        );
        assert_eq!(VerificationResult::valid().error_message(), None);
    }

    #[test]
    fn test_security_events() {
        assert!(VerificationFailure::InvalidSignature.is_security_event());
        assert!(VerificationFailure::Unsigned.is_security_event());
        assert!(!VerificationFailure::Expired.is_security_event());
        assert!(!VerificationFailure::Malformed("x".into()).is_security_event());
    }
}
