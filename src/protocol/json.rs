//! JSON wire format for [`StockEvent`]
//!
//! Payloads are UTF-8 JSON objects with exactly three fields:
//!
//! ```text
//! {"company":"AAPL","eventType":"buy","price":123.4567}
//! ```
//!
//! Decoding is strict about types and lenient about extra fields. A payload
//! that fails to decode is always a recoverable [`DecodeError`]; callers log
//! it and move on to the next message.

use thiserror::Error;

use crate::models::StockEvent;
use crate::utils::validation::is_valid_price;

/// Errors produced while turning a payload back into a [`StockEvent`]
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, not an object, missing fields or wrong field types
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Well-typed but outside the event domain (empty company, price <= 0)
    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
#[error("Failed to encode event: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Serializes and deserializes stock events for the message channel
pub struct EventCodec;

impl EventCodec {
    /// Content-type label attached to published messages (legacy, not enforced)
    pub const CONTENT_TYPE: &'static str = "text/plain";

    pub fn encode(event: &StockEvent) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(event)?)
    }

    pub fn decode(payload: &[u8]) -> Result<StockEvent, DecodeError> {
        let event: StockEvent = serde_json::from_slice(payload)?;

        if event.company.is_empty() {
            return Err(DecodeError::InvalidField {
                field: "company",
                reason: "must not be empty".to_string(),
            });
        }

        if !is_valid_price(event.price) {
            return Err(DecodeError::InvalidField {
                field: "price",
                reason: format!("{} is not a positive price", event.price),
            });
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;

    #[test]
    fn test_round_trip() {
        let events = [
            StockEvent::new("AAPL", EventType::Buy, 123.456789),
            StockEvent::new("MSFT", EventType::Sell, 549.9999999),
            StockEvent::new("TSLA", EventType::Unknown("hold".to_string()), 50.0),
            StockEvent::new("BERKSHIRE-B", EventType::Buy, 100.0),
            StockEvent::new("Acme Holdings International", EventType::Sell, 61.5),
        ];

        for event in events {
            let payload = EventCodec::encode(&event).unwrap();
            assert_eq!(EventCodec::decode(&payload).unwrap(), event);
        }
    }

    #[test]
    fn test_wire_field_names() {
        let payload = EventCodec::encode(&StockEvent::new("AAPL", EventType::Buy, 100.5)).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(json["company"], "AAPL");
        assert_eq!(json["eventType"], "buy");
        assert_eq!(json["price"], 100.5);
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(EventCodec::decode(b"not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(EventCodec::decode(b"[1,2,3]"), Err(DecodeError::Malformed(_))));
        assert!(matches!(
            EventCodec::decode(br#"{"company":"AAPL","eventType":"buy"}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            EventCodec::decode(br#"{"company":"AAPL","eventType":"buy","price":"12.5"}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            EventCodec::decode(br#"{"company":7,"eventType":"buy","price":12.5}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_out_of_domain_values() {
        let err = EventCodec::decode(br#"{"company":"","eventType":"buy","price":12.5}"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "company", .. }));

        let err = EventCodec::decode(br#"{"company":"AAPL","eventType":"sell","price":-3}"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "price", .. }));
    }

    #[test]
    fn test_decode_accepts_any_non_empty_company() {
        let payload = br#"{"company":"BERKSHIRE-B","eventType":"buy","price":100.0}"#;
        assert_eq!(EventCodec::decode(payload).unwrap().company, "BERKSHIRE-B");

        let payload = br#"{"company":" padded ","eventType":"sell","price":1.5}"#;
        assert_eq!(EventCodec::decode(payload).unwrap().company, " padded ");
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let event = EventCodec::decode(
            br#"{"company":"AAPL","eventType":"sell","price":77.1,"venue":"XNAS"}"#,
        )
        .unwrap();
        assert_eq!(event, StockEvent::new("AAPL", EventType::Sell, 77.1));
    }
}
