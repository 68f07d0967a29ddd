pub mod stock_event;
pub mod normalized_record;

pub use stock_event::{EventType, StockEvent};
pub use normalized_record::NormalizedRecord;
