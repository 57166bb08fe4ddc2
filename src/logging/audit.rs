//! Security audit logging
//!
//! Rejected attestations and tokens that look forged or tampered are
//! written as JSONL audit events, in addition to a `warn!` on the
//! `mcre::audit` target.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::verification::VerificationFailure;

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// RSA signature did not verify
    InvalidSignature,
    /// Snapshot contents do not hash to the claimed proof
    HashMismatch,
    /// `UNSIGNED` sentinel presented for verification
    UnsignedPresented,
    /// Token header algorithm was not RS256
    AlgorithmMismatch,
}

impl AuditEventType {
    /// Audit classification for a verification failure, if it warrants one
    pub fn from_failure(failure: &VerificationFailure) -> Option<Self> {
        match failure {
            VerificationFailure::InvalidSignature => Some(Self::InvalidSignature),
            VerificationFailure::HashMismatch => Some(Self::HashMismatch),
            VerificationFailure::Unsigned => Some(Self::UnsignedPresented),
            VerificationFailure::AlgorithmMismatch => Some(Self::AlgorithmMismatch),
            VerificationFailure::Malformed(_) | VerificationFailure::Expired => None,
        }
    }
}

/// Kind of artifact that failed verification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Snapshot,
    Signature,
    Token,
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub artifact: ArtifactKind,
    /// User the artifact claims to be about, when known
    pub user_id: Option<String>,
    pub resolution_id: Option<String>,
    /// Hash proof or token fingerprint involved
    pub reference: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, artifact: ArtifactKind) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            artifact,
            user_id: None,
            resolution_id: None,
            reference: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_resolution(mut self, resolution_id: impl Into<String>) -> Self {
        self.resolution_id = Some(resolution_id.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Audit logger that writes events to an optional JSONL file
#[derive(Clone, Default)]
pub struct AuditLogger {
    inner: Arc<Mutex<Option<BufWriter<File>>>>,
    recorded: Arc<AtomicU64>,
}

impl AuditLogger {
    /// Logger that only emits tracing events
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append events to the file at `path`
    pub fn with_file(path: PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Audit logging initialized to {}", path.display());

        Ok(Self {
            inner: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
            recorded: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Record an audit event
    pub fn record(&self, event: AuditEvent) {
        self.recorded.fetch_add(1, Ordering::Relaxed);

        warn!(
            target: "mcre::audit",
            event_type = ?event.event_type,
            artifact = ?event.artifact,
            user_id = event.user_id.as_deref().unwrap_or("-"),
            resolution_id = event.resolution_id.as_deref().unwrap_or("-"),
            "Security event: verification rejected"
        );

        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(ref mut writer) = *guard {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write audit event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        }
    }

    /// Record an event for `failure` if it is a security event
    pub fn record_failure(
        &self,
        failure: &VerificationFailure,
        artifact: ArtifactKind,
        decorate: impl FnOnce(AuditEvent) -> AuditEvent,
    ) {
        if let Some(event_type) = AuditEventType::from_failure(failure) {
            self.record(decorate(AuditEvent::new(event_type, artifact)));
        }
    }

    /// Number of events recorded by this logger (and its clones)
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_jsonl() {
        let event = AuditEvent::new(AuditEventType::HashMismatch, ArtifactKind::Snapshot)
            .with_user("user-1")
            .with_resolution("res-1");
        let line = event.to_jsonl().unwrap();
        assert!(line.contains("\"event_type\":\"hash_mismatch\""));
        assert!(line.contains("\"artifact\":\"snapshot\""));
    }

    #[test]
    fn test_only_security_failures_recorded() {
        let audit = AuditLogger::new();
        audit.record_failure(&VerificationFailure::Expired, ArtifactKind::Token, |e| e);
        assert_eq!(audit.recorded(), 0);

        audit.record_failure(&VerificationFailure::InvalidSignature, ArtifactKind::Token, |e| e);
        assert_eq!(audit.clone().recorded(), 1);
    }

    #[test]
    fn test_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let audit = AuditLogger::with_file(path.clone()).unwrap();

        audit.record(AuditEvent::new(AuditEventType::UnsignedPresented, ArtifactKind::Signature));
        audit.record(AuditEvent::new(AuditEventType::InvalidSignature, ArtifactKind::Token));

        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("unsigned_presented"));
    }
}
