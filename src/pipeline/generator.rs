use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{EventType, StockEvent};

/// Lower bound of the synthetic price range
pub const MIN_PRICE: f64 = 50.0;
/// Upper bound of the synthetic price range
pub const MAX_PRICE: f64 = 550.0;

/// Random event source for one ticker symbol
///
/// Each generator owns its RNG, seeded from the wall clock, the symbol and the
/// process id, so publishers for different symbols started in the same instant
/// still produce unrelated sequences.
#[derive(Debug)]
pub struct EventGenerator {
    symbol: String,
    rng: StdRng,
}

impl EventGenerator {
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        let seed = seed_for(&symbol);
        Self::with_seed(symbol, seed)
    }

    /// Deterministic generator, for tests and replays
    pub fn with_seed(symbol: impl Into<String>, seed: u64) -> Self {
        Self {
            symbol: symbol.into(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Buy or sell with equal probability, price uniform in `[MIN_PRICE, MAX_PRICE)`
    pub fn next_event(&mut self) -> StockEvent {
        let event_type = if self.rng.random_bool(0.5) {
            EventType::Buy
        } else {
            EventType::Sell
        };
        let price = self.rng.random_range(MIN_PRICE..MAX_PRICE);

        StockEvent::new(self.symbol.clone(), event_type, price)
    }
}

fn seed_for(symbol: &str) -> u64 {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;

    // FNV-1a over the symbol bytes
    let symbol_hash = symbol
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        });

    nanos ^ symbol_hash ^ (u64::from(std::process::id()) << 32)
}
