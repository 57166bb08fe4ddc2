//! Error types for the capability engine
//!
//! Verification outcomes are not errors; they are reported through
//! `VerificationResult` / `TokenValidationResult`. This enum only covers
//! configuration and infrastructure failures.

/// Main error type for capability engine operations
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fact source error: {0}")]
    FactSource(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CapabilityError {
    /// Whether the error comes from missing or unusable key material
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {}", err))
    }
}

impl From<mongodb::error::Error> for CapabilityError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::FactSource(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for CapabilityError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Signing(format!("JWT error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for CapabilityError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::Timeout(err.to_string())
    }
}

/// Result type alias for capability engine operations
pub type Result<T> = std::result::Result<T, CapabilityError>;
