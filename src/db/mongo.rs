//! MongoDB client and read-only collection wrapper

use bson::{doc, Document};
use mongodb::{Client, Collection};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::types::CapabilityError;

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client and verify connectivity
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, CapabilityError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await.map_err(|e| {
            CapabilityError::FactSource(format!("Failed to connect to MongoDB: {}", e))
        })?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CapabilityError::FactSource(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed read-only collection
    pub fn collection<T>(&self, name: &str) -> MongoCollection<T>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync,
    {
        MongoCollection {
            inner: self.client.database(&self.db_name).collection::<T>(name),
        }
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection, reads only
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    /// Find one live (not soft-deleted) document, optionally sorted
    pub async fn find_one(
        &self,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Option<T>, CapabilityError> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let mut query = self.inner.find_one(full_filter);
        if let Some(sort) = sort {
            query = query.sort(sort);
        }

        query
            .await
            .map_err(|e| CapabilityError::FactSource(format!("Find failed: {}", e)))
    }

    /// Find every live (not soft-deleted) document matching `filter`
    pub async fn find_all(&self, filter: Document) -> Result<Vec<T>, CapabilityError> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let mut cursor = self
            .inner
            .find(full_filter)
            .await
            .map_err(|e| CapabilityError::FactSource(format!("Find failed: {}", e)))?;

        let mut results = Vec::new();
        while cursor.advance().await? {
            results.push(cursor.deserialize_current()?);
        }
        Ok(results)
    }
}
