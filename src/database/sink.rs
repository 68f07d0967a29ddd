use async_trait::async_trait;
use mongodb::{Client, Collection};

use super::connection::{establish_connection, MongoConfig, SinkError};
use crate::models::NormalizedRecord;

/// Destination for normalized records
///
/// Every call appends a new record; there is no upsert or uniqueness on
/// `company`. Implementations must not reorder writes issued by one caller.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn write(&self, record: &NormalizedRecord) -> Result<(), SinkError>;
}

/// Sink backed by a MongoDB collection (`stockmarket.stocks` by default)
///
/// The client is connected once and reused for every write. Writes are
/// acknowledged according to the configured write concern.
pub struct MongoSink {
    collection: Collection<NormalizedRecord>,
}

impl MongoSink {
    /// Connect to MongoDB and bind the target collection
    pub async fn connect(config: &MongoConfig) -> Result<Self, SinkError> {
        let client = establish_connection(config).await?;
        Ok(Self::from_client(client, config))
    }

    pub fn from_client(client: Client, config: &MongoConfig) -> Self {
        let collection = client
            .database(&config.database)
            .collection::<NormalizedRecord>(&config.collection);

        Self { collection }
    }

    pub fn collection_name(&self) -> String {
        format!("{}.{}", self.collection.namespace().db, self.collection.name())
    }
}

#[async_trait]
impl Sink for MongoSink {
    async fn write(&self, record: &NormalizedRecord) -> Result<(), SinkError> {
        let result = self
            .collection
            .insert_one(record)
            .await
            .map_err(|e| SinkError::WriteFailed(e.to_string()))?;

        tracing::trace!(
            "Inserted {} record into {} ({:?})",
            record.company,
            self.collection.name(),
            result.inserted_id
        );

        Ok(())
    }
}
