use serde::{Deserialize, Serialize};
use std::fmt;

/// A single synthetic trade event for one ticker symbol.
///
/// This is the wire entity exchanged between publishers and consumers. It is
/// never persisted in this shape; consumers turn it into a
/// [`NormalizedRecord`](super::NormalizedRecord).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEvent {
    /// Ticker symbol (e.g. "AAPL")
    pub company: String,
    pub event_type: EventType,
    pub price: f64,
}

impl StockEvent {
    pub fn new(company: impl Into<String>, event_type: EventType, price: f64) -> Self {
        Self {
            company: company.into(),
            event_type,
            price,
        }
    }
}

/// Event side: buy or sell
///
/// Any other string on the wire is kept as `Unknown` instead of being rejected,
/// so a consumer can log it and still persist the price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Buy,
    Sell,
    #[serde(untagged)]
    Unknown(String),
}

impl EventType {
    /// Returns true for the two recognized literals
    pub fn is_known(&self) -> bool {
        matches!(self, EventType::Buy | EventType::Sell)
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::Buy => "buy",
            EventType::Sell => "sell",
            EventType::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(serde_json::to_string(&EventType::Buy).unwrap(), "\"buy\"");
        assert_eq!(serde_json::to_string(&EventType::Sell).unwrap(), "\"sell\"");
    }

    #[test]
    fn test_unknown_event_type_is_kept() {
        let parsed: EventType = serde_json::from_str("\"hold\"").unwrap();
        assert_eq!(parsed, EventType::Unknown("hold".to_string()));
        assert!(!parsed.is_known());
        assert_eq!(parsed.to_string(), "hold");
    }

    #[test]
    fn test_event_type_must_be_a_string() {
        assert!(serde_json::from_str::<EventType>("42").is_err());
    }
}
