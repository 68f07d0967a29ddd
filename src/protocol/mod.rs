pub mod json;

pub use json::{DecodeError, EncodeError, EventCodec};
