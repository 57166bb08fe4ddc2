//! mcre - monetization capability resolution and attestation CLI

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use serde_json::json;
use tracing::{error, info};

use mcre::{
    attestation::{AttestationVerifier, ResolvedCapabilitySnapshot, SnapshotFreshness},
    config::{Args, Command},
    db::MongoFactStore,
    facts::InMemoryFactStore,
    logging::{self, AuditLogger},
    token::{Rs256TokenCodec, TokenCodec},
    CapabilityEngine, CapabilityError, PlatformKeys, ResolveOptions,
};

/// Exit code for a verification that ran but rejected its input
const EXIT_REJECTED: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init_tracing(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        built = env!("BUILD_TIMESTAMP"),
        mode = if args.store.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" },
        "mcre starting"
    );

    let keys = args.keys.load()?;
    let audit = match &args.audit_log_path {
        Some(path) => AuditLogger::with_file(path.clone())?,
        None => AuditLogger::new(),
    };

    match args.command.clone() {
        Command::Resolve {
            user_id,
            trusted_time,
            ai_inference_hash,
            with_token,
        } => {
            let engine = build_engine(&args, &keys).await?;
            let options = ResolveOptions {
                trusted_time,
                ai_inference_result_hash: ai_inference_hash,
            };

            let (snapshot, token) = if with_token {
                let codec = Rs256TokenCodec::new(&keys)?;
                let (snapshot, token) = with_timeout(
                    &args,
                    engine.issue_monetization_token(&user_id, &codec, args.token_expiry_seconds, options),
                )
                .await?;
                (snapshot, Some(token))
            } else {
                let snapshot =
                    with_timeout(&args, engine.resolve_user_capabilities(&user_id, options)).await?;
                (snapshot, None)
            };

            print_json(&json!({ "snapshot": snapshot, "token": token }))?;
        }

        Command::Check { user_id } => {
            let engine = build_engine(&args, &keys).await?;
            let minimal = with_timeout(&args, async {
                Ok(engine.resolve_user_capabilities_minimal(&user_id, None).await)
            })
            .await?;

            print_json(&minimal)?;
        }

        Command::IssueToken {
            user_id,
            ttl_seconds,
        } => {
            let codec = Rs256TokenCodec::new(&keys)?;
            let engine = build_engine(&args, &keys).await?;
            let ttl = ttl_seconds.unwrap_or(args.token_expiry_seconds);
            let (_, token) = with_timeout(
                &args,
                engine.issue_monetization_token(&user_id, &codec, ttl, ResolveOptions::default()),
            )
            .await?;

            println!("{}", token);
        }

        Command::VerifyToken { token, at } => {
            let codec = Rs256TokenCodec::new(&keys)?.with_audit(audit);
            let token = mcre::token::extract_token_from_header(Some(token.as_str()))
                .unwrap_or(token.as_str());
            let result = codec.decode_at(token, at.unwrap_or_else(|| Utc::now().timestamp()));

            print_json(&json!({
                "valid": result.valid,
                "payload": result.payload.clone(),
                "error": result.error_message(),
            }))?;
            if !result.valid {
                std::process::exit(EXIT_REJECTED);
            }
        }

        Command::VerifySnapshot {
            path,
            max_age_seconds,
        } => {
            let verifier = AttestationVerifier::new(&keys)?.with_audit(audit);
            let snapshot = read_snapshot(&path)?;
            let result = verifier.verify_capability_snapshot(&snapshot);

            let fresh = max_age_seconds.map(|secs| {
                SnapshotFreshness::new(chrono::Duration::seconds(secs)).is_fresh(&snapshot, Utc::now())
            });

            print_json(&json!({
                "valid": result.valid,
                "fresh": fresh,
                "resolutionId": snapshot.resolution_id(),
                "userId": snapshot.user_id(),
                "error": result.error_message(),
            }))?;
            if !result.valid || fresh == Some(false) {
                std::process::exit(EXIT_REJECTED);
            }
        }
    }

    Ok(())
}

/// Build the engine over the configured fact store
async fn build_engine(args: &Args, keys: &PlatformKeys) -> anyhow::Result<CapabilityEngine> {
    if args.store.dev_mode {
        let store = match &args.store.facts_fixture {
            Some(path) => InMemoryFactStore::load(path)?,
            None => InMemoryFactStore::new(),
        };
        info!("Using in-memory fact store (dev mode)");
        return Ok(CapabilityEngine::new(Arc::new(store), keys));
    }

    let store = MongoFactStore::connect(&args.store.mongodb_uri, &args.store.mongodb_db).await?;
    Ok(CapabilityEngine::new(Arc::new(store), keys))
}

/// Bound a resolution by `RESOLUTION_TIMEOUT_MS`
async fn with_timeout<T>(
    args: &Args,
    fut: impl std::future::Future<Output = Result<T, CapabilityError>>,
) -> Result<T, CapabilityError> {
    tokio::time::timeout(Duration::from_millis(args.resolution_timeout_ms), fut).await?
}

fn read_snapshot(path: &Path) -> anyhow::Result<ResolvedCapabilitySnapshot> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };

    // Accept either a bare snapshot or the `resolve` command's output
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let snapshot = match value.get("snapshot") {
        Some(inner) => serde_json::from_value(inner.clone())?,
        None => serde_json::from_value(value)?,
    };
    Ok(snapshot)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
