use mongodb::bson::doc;
use mongodb::options::{Acknowledgment, ClientOptions, WriteConcern};
use mongodb::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Sink / store related errors
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Invalid store config: {0}")]
    InvalidConfig(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// MongoDB connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string, may list several replica set members
    pub uri: String,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Write acknowledgement level for inserts
    #[serde(default)]
    pub write_concern: WriteAck,

    /// How long to wait for a usable server before failing an operation
    #[serde(default = "default_server_selection_timeout")]
    pub server_selection_timeout_ms: u64,
}

/// Write acknowledgement level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteAck {
    /// Acknowledged by this many nodes
    Nodes(u32),
    /// Acknowledged by a majority of the replica set
    Majority,
}

impl Default for WriteAck {
    fn default() -> Self {
        WriteAck::Nodes(1)
    }
}

impl FromStr for WriteAck {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case("majority") {
            return Ok(WriteAck::Majority);
        }

        match value.parse::<u32>() {
            Ok(nodes) if nodes > 0 => Ok(WriteAck::Nodes(nodes)),
            _ => Err(SinkError::InvalidConfig(format!(
                "write concern must be a positive node count or 'majority', got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for WriteAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteAck::Nodes(n) => write!(f, "w={}", n),
            WriteAck::Majority => f.write_str("w=majority"),
        }
    }
}

impl From<WriteAck> for WriteConcern {
    fn from(ack: WriteAck) -> Self {
        let mut concern = WriteConcern::default();
        concern.w = Some(match ack {
            WriteAck::Nodes(n) => Acknowledgment::Nodes(n),
            WriteAck::Majority => Acknowledgment::Majority,
        });
        concern
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
            collection: default_collection(),
            write_concern: WriteAck::default(),
            server_selection_timeout_ms: default_server_selection_timeout(),
        }
    }
}

pub(crate) fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "stockmarket".to_string()
}

fn default_collection() -> String {
    "stocks".to_string()
}

fn default_server_selection_timeout() -> u64 {
    5000
}

/// Build a MongoDB client and verify the deployment answers a ping
///
/// # Arguments
/// * `config` - Connection string, write concern and timeouts
///
/// # Returns
/// * `Result<Client, SinkError>` - Connected client or error
pub async fn establish_connection(config: &MongoConfig) -> Result<Client, SinkError> {
    tracing::info!("Establishing MongoDB connection ({})", config.write_concern);

    let mut options = ClientOptions::parse(&config.uri)
        .await
        .map_err(|e| SinkError::InvalidConfig(format!("MONGO_URI: {}", e)))?;

    options.app_name = Some("stock-stream".to_string());
    options.write_concern = Some(config.write_concern.into());
    options.server_selection_timeout = Some(Duration::from_millis(config.server_selection_timeout_ms));

    let client = Client::with_options(options)
        .map_err(|e| SinkError::ConnectionFailed(e.to_string()))?;

    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| SinkError::ConnectionFailed(e.to_string()))?;

    tracing::info!("MongoDB connection successful");

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MongoConfig::default();
        assert_eq!(config.database, "stockmarket");
        assert_eq!(config.collection, "stocks");
        assert_eq!(config.write_concern, WriteAck::Nodes(1));
    }

    #[test]
    fn test_write_ack_parsing() {
        assert_eq!("1".parse::<WriteAck>().unwrap(), WriteAck::Nodes(1));
        assert_eq!("3".parse::<WriteAck>().unwrap(), WriteAck::Nodes(3));
        assert_eq!("Majority".parse::<WriteAck>().unwrap(), WriteAck::Majority);
        assert!("0".parse::<WriteAck>().is_err());
        assert!("all".parse::<WriteAck>().is_err());
    }

    #[test]
    fn test_write_concern_conversion() {
        let concern: WriteConcern = WriteAck::Nodes(1).into();
        assert_eq!(concern.w, Some(Acknowledgment::Nodes(1)));

        let concern: WriteConcern = WriteAck::Majority.into();
        assert_eq!(concern.w, Some(Acknowledgment::Majority));
    }

    #[tokio::test]
    async fn test_invalid_uri_is_rejected() {
        let config = MongoConfig {
            uri: "not-a-mongo-uri".to_string(),
            ..Default::default()
        };

        assert!(matches!(
            establish_connection(&config).await,
            Err(SinkError::InvalidConfig(_))
        ));
    }
}
