//! Configuration for the capability engine
//!
//! CLI arguments and environment variable handling using clap, plus the
//! immutable [`PlatformKeys`] object that signer, verifier and token codec
//! are constructed from.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use jsonwebtoken::{DecodingKey, EncodingKey};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::token::DEFAULT_TOKEN_TTL_SECONDS;
use crate::types::{CapabilityError, Result};

/// Environment variable holding the PEM-encoded RSA private key
pub const PRIVATE_KEY_ENV: &str = "MCRE_PLATFORM_PRIVATE_KEY";

/// Environment variable holding the PEM-encoded RSA public key
pub const PUBLIC_KEY_ENV: &str = "MCRE_PLATFORM_PUBLIC_KEY";

/// mcre - monetization capability resolution and attestation
#[derive(Parser, Debug, Clone)]
#[command(name = "mcre")]
#[command(about = "Resolve, attest and verify monetization capabilities")]
#[command(version)]
pub struct Args {
    /// Platform signing keys
    #[command(flatten)]
    pub keys: KeyArgs,

    /// Fact store configuration
    #[command(flatten)]
    pub store: StoreArgs,

    /// Monetization token lifetime in seconds
    #[arg(long, env = "TOKEN_EXPIRY_SECONDS", default_value_t = DEFAULT_TOKEN_TTL_SECONDS)]
    pub token_expiry_seconds: u64,

    /// Upper bound on a single resolution, in milliseconds
    #[arg(long, env = "RESOLUTION_TIMEOUT_MS", default_value = "5000")]
    pub resolution_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Append security audit events (JSONL) to this file
    #[arg(long, env = "AUDIT_LOG_PATH")]
    pub audit_log_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Platform RSA key configuration
#[derive(Parser, Debug, Clone)]
pub struct KeyArgs {
    /// PEM-encoded RSA private key used for attestation signing
    #[arg(long, env = PRIVATE_KEY_ENV, hide_env_values = true)]
    pub private_key: Option<String>,

    /// Path to the PEM private key (takes precedence over the inline key)
    #[arg(long, env = "MCRE_PLATFORM_PRIVATE_KEY_FILE")]
    pub private_key_file: Option<PathBuf>,

    /// PEM-encoded RSA public key used for verification
    #[arg(long, env = PUBLIC_KEY_ENV, hide_env_values = true)]
    pub public_key: Option<String>,

    /// Path to the PEM public key (takes precedence over the inline key)
    #[arg(long, env = "MCRE_PLATFORM_PUBLIC_KEY_FILE")]
    pub public_key_file: Option<PathBuf>,
}

/// Fact store configuration
#[derive(Parser, Debug, Clone)]
pub struct StoreArgs {
    /// Use the in-memory fact store instead of MongoDB
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// JSON fixture to seed the in-memory store (dev mode only)
    #[arg(long, env = "FACTS_FIXTURE")]
    pub facts_fixture: Option<PathBuf>,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database holding subscriptions and profiles
    #[arg(long, env = "MONGODB_DB", default_value = "commerce")]
    pub mongodb_db: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve capabilities and print the signed snapshot
    Resolve {
        user_id: String,

        /// Fixed resolution time (RFC 3339) instead of the wall clock
        #[arg(long)]
        trusted_time: Option<DateTime<Utc>>,

        /// Hash of an AI-assisted inference pass to record in the context
        #[arg(long)]
        ai_inference_hash: Option<String>,

        /// Also issue a monetization token for the snapshot
        #[arg(long)]
        with_token: bool,
    },

    /// Quick capability check without attestation
    Check { user_id: String },

    /// Resolve and print only a monetization token
    IssueToken {
        user_id: String,

        /// Token lifetime override in seconds
        #[arg(long)]
        ttl_seconds: Option<u64>,
    },

    /// Verify a monetization token
    VerifyToken {
        token: String,

        /// Unix time to verify against instead of now
        #[arg(long)]
        at: Option<i64>,
    },

    /// Verify a snapshot JSON file ("-" reads stdin)
    VerifySnapshot {
        path: PathBuf,

        /// Reject snapshots older than this many seconds
        #[arg(long)]
        max_age_seconds: Option<i64>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.token_expiry_seconds == 0 {
            return Err("TOKEN_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        if self.resolution_timeout_ms == 0 {
            return Err("RESOLUTION_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.store.facts_fixture.is_some() && !self.store.dev_mode {
            return Err("FACTS_FIXTURE requires DEV_MODE".to_string());
        }

        Ok(())
    }
}

impl KeyArgs {
    /// Load PEM material from files or inline values and parse it
    pub fn load(&self) -> Result<PlatformKeys> {
        let private = read_pem(self.private_key_file.as_deref(), self.private_key.as_deref())?;
        let public = read_pem(self.public_key_file.as_deref(), self.public_key.as_deref())?;

        Ok(PlatformKeys::from_pem(
            private.as_ref().map(|p| p.as_str()),
            public.as_ref().map(|p| p.as_str()),
        ))
    }
}

fn read_pem(file: Option<&Path>, inline: Option<&str>) -> Result<Option<Zeroizing<String>>> {
    if let Some(path) = file {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            CapabilityError::Config(format!("Cannot read key file {}: {}", path.display(), e))
        })?;
        return Ok(Some(Zeroizing::new(pem)));
    }

    Ok(inline
        .filter(|pem| !pem.trim().is_empty())
        .map(|pem| Zeroizing::new(pem.to_string())))
}

/// Platform key material, loaded once and read-only afterwards.
///
/// A missing or unparseable private key leaves signing disabled (snapshots
/// carry the `UNSIGNED` sentinel). A missing or unparseable public key only
/// surfaces when a verifier is requested.
#[derive(Clone)]
pub struct PlatformKeys {
    signing: Option<EncodingKey>,
    verifying: std::result::Result<DecodingKey, String>,
}

impl PlatformKeys {
    /// Parse PEM-encoded RSA keys
    pub fn from_pem(private_pem: Option<&str>, public_pem: Option<&str>) -> Self {
        let signing = match private_pem {
            Some(pem) => match EncodingKey::from_rsa_pem(pem.as_bytes()) {
                Ok(key) => {
                    info!("Platform signing key loaded");
                    Some(key)
                }
                Err(e) => {
                    warn!("{} is not a valid RSA PEM, attestations will be UNSIGNED: {}", PRIVATE_KEY_ENV, e);
                    None
                }
            },
            None => {
                warn!("{} not set, attestations will be UNSIGNED", PRIVATE_KEY_ENV);
                None
            }
        };

        let verifying = match public_pem {
            Some(pem) => DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| format!("{} is not a valid RSA PEM: {}", PUBLIC_KEY_ENV, e)),
            None => Err(format!("{} is not configured", PUBLIC_KEY_ENV)),
        };

        Self { signing, verifying }
    }

    /// Keys with nothing configured
    pub fn none() -> Self {
        Self {
            signing: None,
            verifying: Err(format!("{} is not configured", PUBLIC_KEY_ENV)),
        }
    }

    pub fn signing_key(&self) -> Option<&EncodingKey> {
        self.signing.as_ref()
    }

    /// Public key, or a configuration error when absent or invalid
    pub fn verifying_key(&self) -> Result<&DecodingKey> {
        self.verifying
            .as_ref()
            .map_err(|e| CapabilityError::Config(e.clone()))
    }

    pub fn can_sign(&self) -> bool {
        self.signing.is_some()
    }

    pub fn can_verify(&self) -> bool {
        self.verifying.is_ok()
    }
}

impl fmt::Debug for PlatformKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformKeys")
            .field("can_sign", &self.can_sign())
            .field("can_verify", &self.can_verify())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_PEM: &str = include_str!("../tests/fixtures/platform_private.pem");
    const PUBLIC_PEM: &str = include_str!("../tests/fixtures/platform_public.pem");

    #[test]
    fn test_keys_from_pem() {
        let keys = PlatformKeys::from_pem(Some(PRIVATE_PEM), Some(PUBLIC_PEM));
        assert!(keys.can_sign());
        assert!(keys.can_verify());
    }

    #[test]
    fn test_key_file_takes_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, PUBLIC_PEM.as_bytes()).unwrap();

        let key_args = KeyArgs {
            private_key: Some(PRIVATE_PEM.to_string()),
            private_key_file: None,
            public_key: Some("garbage".to_string()),
            public_key_file: Some(file.path().to_path_buf()),
        };
        let keys = key_args.load().unwrap();
        assert!(keys.can_sign());
        assert!(keys.can_verify());
    }

    #[test]
    fn test_missing_key_file_is_config_error() {
        let key_args = KeyArgs {
            private_key: None,
            private_key_file: Some(PathBuf::from("/nonexistent/mcre/key.pem")),
            public_key: None,
            public_key_file: None,
        };
        assert!(key_args.load().err().unwrap().is_config());
    }

    #[test]
    fn test_missing_keys() {
        let keys = PlatformKeys::none();
        assert!(!keys.can_sign());
        let err = keys.verifying_key().err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_private_key_degrades() {
        let keys = PlatformKeys::from_pem(Some("not a pem"), Some(PUBLIC_PEM));
        assert!(!keys.can_sign());
        assert!(keys.can_verify());
    }

    #[test]
    fn test_invalid_public_key_is_config_error() {
        let keys = PlatformKeys::from_pem(Some(PRIVATE_PEM), Some("garbage"));
        assert!(keys.can_sign());
        assert!(keys.verifying_key().err().unwrap().is_config());
    }

    #[test]
    fn test_args_parse_and_validate() {
        let args = Args::try_parse_from(["mcre", "--dev-mode", "check", "user-1"]).unwrap();
        assert!(args.store.dev_mode);
        assert_eq!(args.token_expiry_seconds, DEFAULT_TOKEN_TTL_SECONDS);
        assert!(args.validate().is_ok());
        assert!(matches!(args.command, Command::Check { ref user_id } if user_id == "user-1"));

        let bad = Args::try_parse_from(["mcre", "--facts-fixture", "f.json", "check", "u"]).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_trusted_time_parsed() {
        let args = Args::try_parse_from([
            "mcre",
            "resolve",
            "user-1",
            "--trusted-time",
            "2024-05-01T12:00:00Z",
        ])
        .unwrap();
        match args.command {
            Command::Resolve { trusted_time, .. } => {
                assert_eq!(trusted_time.unwrap().timestamp(), 1_714_564_800);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
