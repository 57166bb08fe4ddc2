//! Capability resolution entry points
//!
//! Orchestrates one resolution: the four fact probes run concurrently, the
//! resolver combines them, and the result is hashed and signed into a
//! [`ResolvedCapabilitySnapshot`]. Every call gets a fresh resolution id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::attestation::{AttestationSigner, ResolvedCapabilitySnapshot};
use crate::config::PlatformKeys;
use crate::facts::{
    check_kyc_capability, check_reputation_capability, check_risk_capability,
    check_subscription_capability, AllowAllRegions, ProfileSource, RegionPolicy,
    SubscriptionSource,
};
use crate::resolver::{resolve_capabilities, FactSignals, MinimalCapabilities};
use crate::token::TokenCodec;
use crate::types::Result;

/// Per-call resolution options
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Use this instant instead of the wall clock (deterministic tests,
    /// replays against a trusted time source)
    pub trusted_time: Option<DateTime<Utc>>,

    /// Hash of an AI-assisted inference result to record in the context
    pub ai_inference_result_hash: Option<String>,
}

impl ResolveOptions {
    pub fn at(trusted_time: DateTime<Utc>) -> Self {
        Self {
            trusted_time: Some(trusted_time),
            ..Default::default()
        }
    }

    pub fn with_ai_inference(mut self, result_hash: impl Into<String>) -> Self {
        self.ai_inference_result_hash = Some(result_hash.into());
        self
    }
}

/// Monetization capability engine
#[derive(Clone)]
pub struct CapabilityEngine {
    subscriptions: Arc<dyn SubscriptionSource>,
    profiles: Arc<dyn ProfileSource>,
    region: Arc<dyn RegionPolicy>,
    signer: AttestationSigner,
}

impl CapabilityEngine {
    /// Engine over a store that serves both subscriptions and profiles
    pub fn new<S>(store: Arc<S>, keys: &PlatformKeys) -> Self
    where
        S: SubscriptionSource + ProfileSource + 'static,
    {
        Self::with_sources(store.clone(), store, AttestationSigner::new(keys))
    }

    pub fn with_sources(
        subscriptions: Arc<dyn SubscriptionSource>,
        profiles: Arc<dyn ProfileSource>,
        signer: AttestationSigner,
    ) -> Self {
        Self {
            subscriptions,
            profiles,
            region: Arc::new(AllowAllRegions),
            signer,
        }
    }

    /// Replace the region compliance predicate
    pub fn with_region_policy(mut self, region: Arc<dyn RegionPolicy>) -> Self {
        self.region = region;
        self
    }

    pub fn signing_enabled(&self) -> bool {
        self.signer.is_enabled()
    }

    /// Run all probes concurrently
    async fn gather(&self, user_id: &str, now: DateTime<Utc>) -> FactSignals {
        let (subscription, kyc, risk, reputation) = tokio::join!(
            check_subscription_capability(self.subscriptions.as_ref(), user_id, now),
            check_kyc_capability(self.profiles.as_ref(), user_id),
            check_risk_capability(self.profiles.as_ref(), user_id),
            check_reputation_capability(self.profiles.as_ref(), user_id),
        );

        FactSignals {
            subscription,
            kyc,
            risk,
            reputation,
            region_compliant: self.region.is_compliant(user_id),
        }
    }

    /// Resolve, hash and attest a user's monetization capabilities.
    ///
    /// Unavailable facts degrade the decision rather than failing it, and a
    /// missing signing key yields an `UNSIGNED` snapshot.
    pub async fn resolve_user_capabilities(
        &self,
        user_id: &str,
        options: ResolveOptions,
    ) -> Result<ResolvedCapabilitySnapshot> {
        let resolved_at = options.trusted_time.unwrap_or_else(Utc::now);
        let resolution_id = Uuid::new_v4().to_string();

        let signals = self.gather(user_id, resolved_at).await;
        let resolution = resolve_capabilities(&signals, options.ai_inference_result_hash);

        let snapshot = ResolvedCapabilitySnapshot::attest(
            resolution_id,
            user_id.to_string(),
            resolved_at,
            resolution,
            &self.signer,
        )?;

        info!(
            user_id,
            resolution_id = snapshot.resolution_id(),
            can_monetize = snapshot.capability_state().can_monetize,
            payout_routing_enabled = snapshot.capability_state().payout_routing_enabled,
            signed = snapshot.is_signed(),
            "Capabilities resolved"
        );

        Ok(snapshot)
    }

    /// Resolve, then issue a monetization token for the new snapshot.
    ///
    /// The token's `exp` counts `ttl_seconds` from the resolution instant.
    /// Fails with a configuration error when `codec` cannot sign.
    pub async fn issue_monetization_token(
        &self,
        user_id: &str,
        codec: &dyn TokenCodec,
        ttl_seconds: u64,
        options: ResolveOptions,
    ) -> Result<(ResolvedCapabilitySnapshot, String)> {
        let issued_at = options.trusted_time.unwrap_or_else(Utc::now);
        let snapshot = self
            .resolve_user_capabilities(user_id, ResolveOptions {
                trusted_time: Some(issued_at),
                ..options
            })
            .await?;

        let token = codec.issue(&snapshot, ttl_seconds, issued_at.timestamp())?;
        debug!(user_id, resolution_id = snapshot.resolution_id(), ttl_seconds, "Monetization token issued");

        Ok((snapshot, token))
    }

    /// Monetize/payout flags only, with no id, hash or signature.
    /// For low-stakes checks that need no durable proof.
    pub async fn resolve_user_capabilities_minimal(
        &self,
        user_id: &str,
        trusted_time: Option<DateTime<Utc>>,
    ) -> MinimalCapabilities {
        let now = trusted_time.unwrap_or_else(Utc::now);
        let signals = self.gather(user_id, now).await;
        let minimal = MinimalCapabilities::from(resolve_capabilities(&signals, None).state);

        debug!(user_id, ?minimal, "Minimal capabilities resolved");
        minimal
    }
}
