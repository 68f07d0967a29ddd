use serde::{Deserialize, Serialize};

use super::stock_event::StockEvent;
use crate::utils::rounding::round2;

/// Persisted form of a decoded event: the company and its price rounded to
/// two decimal places.
///
/// Stored as `{ company, avgPrice }`. Every decoded event produces a new,
/// independent record; there is no merge by company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub company: String,
    pub avg_price: f64,
}

impl NormalizedRecord {
    pub fn new(company: impl Into<String>, price: f64) -> Self {
        Self {
            company: company.into(),
            avg_price: round2(price),
        }
    }
}

impl From<&StockEvent> for NormalizedRecord {
    fn from(event: &StockEvent) -> Self {
        Self::new(event.company.clone(), event.price)
    }
}
