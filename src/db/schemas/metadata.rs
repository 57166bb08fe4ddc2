//! Common metadata for fact documents
//!
//! Written by the owning services; the engine only reads `is_deleted`
//! to skip soft-deleted rows.

use serde::{Deserialize, Serialize};

/// Soft-delete marker shared by all fact documents
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// Whether this document has been soft-deleted
    #[serde(default)]
    pub is_deleted: bool,
}
