//! Logging infrastructure
//!
//! Tracing subscriber setup for the binary and the security audit log.

pub mod audit;

pub use audit::{ArtifactKind, AuditEvent, AuditEventType, AuditLogger};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `log_level` when set.
pub fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mcre={},info", log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
