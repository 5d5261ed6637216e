use crate::error::CoreError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One day's OHLCV record for one symbol.
///
/// Rows are identified by the `(symbol, date)` pair. Storing a row whose pair
/// already exists replaces every other field of the stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QuoteRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Equal to `close` unless the data source supplies a genuine adjusted figure.
    pub adjusted_close: f64,
    pub volume: i64,
}

impl QuoteRow {
    /// The identity of this row in storage.
    pub fn key(&self) -> (&str, NaiveDate) {
        (&self.symbol, self.date)
    }

    /// Checks the row invariants: non-empty symbol, finite non-negative prices
    /// and a non-negative volume.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbol.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "symbol".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("adjusted_close", self.adjusted_close),
        ];
        for (name, value) in prices {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidInput(
                    name.to_string(),
                    format!("expected a non-negative price, got {}", value),
                ));
            }
        }

        if self.volume < 0 {
            return Err(CoreError::InvalidInput(
                "volume".to_string(),
                format!("expected a non-negative volume, got {}", self.volume),
            ));
        }

        Ok(())
    }
}
