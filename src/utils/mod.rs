// Utility functions and validation
// Shared by the codec, the consumer and the configuration loader.

pub mod rounding {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::{Decimal, RoundingStrategy};
    use std::str::FromStr;

    /// Round a price to 2 decimal places, ties away from zero.
    ///
    /// Rounding works on the shortest decimal representation of `value`
    /// (the one `Display` prints), so `123.455` rounds to `123.46` even though
    /// the nearest `f64` is slightly below it. Values outside the `Decimal`
    /// range fall back to plain float rounding with the same tie rule.
    pub fn round2(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }

        match Decimal::from_str(&value.to_string()) {
            Ok(decimal) => decimal
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
                .to_f64()
                .unwrap_or(value),
            Err(_) => (value * 100.0).round() / 100.0,
        }
    }
}

pub mod validation {
    /// Validate that a price is a finite, positive number
    pub fn is_valid_price(price: f64) -> bool {
        price.is_finite() && price > 0.0
    }

    /// Validate a ticker symbol: non-empty, at most 10 bytes, no surrounding whitespace
    pub fn is_valid_symbol(symbol: &str) -> bool {
        !symbol.is_empty() && symbol.len() <= 10 && symbol.trim() == symbol
    }
}

#[cfg(test)]
mod tests {
    use super::rounding::round2;
    use super::validation::*;

    #[test]
    fn test_round2_ties_away_from_zero() {
        assert_eq!(round2(123.455), 123.46);
        assert_eq!(round2(123.445), 123.45);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(2.675), 2.68);
    }

    #[test]
    fn test_round2_regular_values() {
        assert_eq!(round2(50.0), 50.0);
        assert_eq!(round2(549.999), 550.0);
        assert_eq!(round2(187.23456), 187.23);
        assert_eq!(round2(0.004), 0.0);
    }

    #[test]
    fn test_round2_is_idempotent() {
        let samples = [0.0, 0.005, 1.005, 50.0, 99.994999, 123.455, 317.3333333, 549.995];
        for x in samples {
            let once = round2(x);
            assert_eq!(round2(once), once, "round2 not idempotent for {}", x);
        }
    }

    #[test]
    fn test_round2_non_finite_passthrough() {
        assert!(round2(f64::NAN).is_nan());
        assert_eq!(round2(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_validation() {
        assert!(is_valid_price(50.0));
        assert!(!is_valid_price(0.0));
        assert!(!is_valid_price(-1.0));
        assert!(!is_valid_price(f64::INFINITY));

        assert!(is_valid_symbol("AAPL"));
        assert!(!is_valid_symbol(""));
        assert!(!is_valid_symbol(" TSLA"));
        assert!(!is_valid_symbol("VERYLONGSYMBOL"));
    }
}
