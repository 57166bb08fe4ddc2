//! Profile document schema
//!
//! Only the monetization-relevant fields are mapped; the rest of the
//! profile document is ignored.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::db::schemas::Metadata;
use crate::facts::ProfileRecord;

/// Collection name for user profiles
pub const PROFILE_COLLECTION: &str = "profiles";

/// Profile document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProfileDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    #[serde(default)]
    pub kyc_status: Option<String>,

    #[serde(default)]
    pub kyc_verified_at: Option<bson::DateTime>,

    #[serde(default)]
    pub risk_score: Option<f64>,

    #[serde(default)]
    pub reputation_score: Option<f64>,
}

impl From<ProfileDoc> for ProfileRecord {
    fn from(doc: ProfileDoc) -> Self {
        ProfileRecord {
            kyc_status: doc.kyc_status,
            kyc_verified_at: doc.kyc_verified_at.map(|t| t.to_chrono()),
            risk_score: doc.risk_score,
            reputation_score: doc.reputation_score,
        }
        .sanitized()
    }
}
