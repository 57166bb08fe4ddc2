//! Monetization tokens
//!
//! A compact, self-contained bearer credential derived from a snapshot:
//! `base64url(header).base64url(payload).signature`, signed RS256 with the
//! platform key. Verifiers need only the public key and the clock.
//!
//! Codecs sit behind [`TokenCodec`] so the resolver never depends on the
//! token format.

mod rs256;

pub use rs256::Rs256TokenCodec;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::attestation::ResolvedCapabilitySnapshot;
use crate::types::Result;
use crate::verification::VerificationFailure;

/// Default token lifetime (24 hours)
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Claims carried by a monetization token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonetizationTokenPayload {
    pub resolution_id: String,
    pub user_id: String,
    pub can_monetize: bool,
    pub can_receive_tips: bool,
    pub can_create_products: bool,
    pub payout_routing_enabled: bool,
    pub resolved_at: String,
    /// Expiration time (Unix seconds)
    pub exp: i64,
}

impl MonetizationTokenPayload {
    /// Derive token claims from a snapshot
    pub fn from_snapshot(snapshot: &ResolvedCapabilitySnapshot, exp: i64) -> Self {
        let state = snapshot.capability_state();
        Self {
            resolution_id: snapshot.resolution_id().to_string(),
            user_id: snapshot.user_id().to_string(),
            can_monetize: state.can_monetize,
            can_receive_tips: state.can_receive_tips,
            can_create_products: state.can_create_products,
            payout_routing_enabled: state.payout_routing_enabled,
            resolved_at: snapshot.resolved_at().to_string(),
            exp,
        }
    }

    /// Expired strictly before `now`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }

    /// Seconds until expiry (negative once expired)
    pub fn time_remaining(&self, now: i64) -> i64 {
        self.exp - now
    }

    /// Whether fewer than `threshold_seconds` remain
    pub fn is_expiring_soon(&self, now: i64, threshold_seconds: i64) -> bool {
        self.time_remaining(now) < threshold_seconds
    }
}

/// Result of token validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub payload: Option<MonetizationTokenPayload>,
    pub error: Option<VerificationFailure>,
}

impl TokenValidationResult {
    pub fn valid(payload: MonetizationTokenPayload) -> Self {
        Self {
            valid: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn invalid(failure: VerificationFailure) -> Self {
        Self {
            valid: false,
            payload: None,
            error: Some(failure),
        }
    }

    /// Human-readable error message, if any
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Encodes and decodes monetization tokens
pub trait TokenCodec: Send + Sync {
    /// Sign claims into a token string
    fn encode(&self, payload: &MonetizationTokenPayload) -> Result<String>;

    /// Verify a token against the clock value `now` (Unix seconds)
    fn decode_at(&self, token: &str, now: i64) -> TokenValidationResult;

    /// Verify a token against the wall clock
    fn decode(&self, token: &str) -> TokenValidationResult {
        self.decode_at(token, Utc::now().timestamp())
    }

    /// Issue a token for `snapshot` valid for `ttl_seconds` from `now`
    fn issue(
        &self,
        snapshot: &ResolvedCapabilitySnapshot,
        ttl_seconds: u64,
        now: i64,
    ) -> Result<String> {
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let payload = MonetizationTokenPayload::from_snapshot(snapshot, now.saturating_add(ttl));
        self.encode(&payload)
    }
}

/// Extract a token from an Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}
