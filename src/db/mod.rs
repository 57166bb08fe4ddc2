//! MongoDB-backed fact store
//!
//! Reads the `subscriptions` and `profiles` collections maintained by the
//! commerce services. The engine never writes to them.

pub mod mongo;
pub mod schemas;

use async_trait::async_trait;
use bson::doc;

pub use mongo::{MongoClient, MongoCollection};
use schemas::{
    select_subscription, ProfileDoc, SubscriptionDoc, PROFILE_COLLECTION, SUBSCRIPTION_COLLECTION,
};

use crate::facts::{ProfileRecord, ProfileSource, SubscriptionKind, SubscriptionRecord, SubscriptionSource};
use crate::types::Result;

/// Fact store over the platform's MongoDB collections
#[derive(Clone)]
pub struct MongoFactStore {
    subscriptions: MongoCollection<SubscriptionDoc>,
    profiles: MongoCollection<ProfileDoc>,
}

impl MongoFactStore {
    pub fn new(client: &MongoClient) -> Self {
        Self {
            subscriptions: client.collection(SUBSCRIPTION_COLLECTION),
            profiles: client.collection(PROFILE_COLLECTION),
        }
    }

    /// Connect and build the store
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = MongoClient::new(uri, db_name).await?;
        Ok(Self::new(&client))
    }
}

#[async_trait]
impl SubscriptionSource for MongoFactStore {
    async fn find_subscription(
        &self,
        user_id: &str,
        kind: SubscriptionKind,
    ) -> Result<Option<SubscriptionRecord>> {
        let rows = self
            .subscriptions
            .find_all(doc! { "user_id": user_id, "kind": kind.as_str() })
            .await?;

        Ok(select_subscription(
            rows.into_iter().filter_map(SubscriptionDoc::into_record),
        ))
    }
}

#[async_trait]
impl ProfileSource for MongoFactStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>> {
        let row = self
            .profiles
            .find_one(doc! { "user_id": user_id }, None)
            .await?;

        Ok(row.map(ProfileRecord::from))
    }
}
