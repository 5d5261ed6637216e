//! Turns a time-series payload into `QuoteRow`s.
//!
//! Parsing is strict about structure and tolerant about values: a missing
//! series, a non-object entry or a bad date key fails the whole payload, while a
//! missing, null, empty, unparseable or negative numeric field becomes zero.

use crate::error::ParseError;
use chrono::NaiveDate;
use configuration::{AdjustedClose, ParserSettings};
use core_types::QuoteRow;
use serde_json::{Map, Value};

pub const META_DATA_KEY: &str = "Meta Data";
pub const META_SYMBOL_KEY: &str = "2. Symbol";

/// Parses every entry of the payload's time series into a row.
///
/// The symbol comes from the payload metadata when present, otherwise
/// `default_symbol` is used.
pub fn parse_daily(
    payload: &Value,
    default_symbol: &str,
    settings: &ParserSettings,
) -> Result<Vec<QuoteRow>, ParseError> {
    let object = payload.as_object().ok_or(ParseError::NotAnObject)?;

    let (series_key, series) = object
        .iter()
        .find(|(key, _)| key.contains(&settings.series_key_pattern))
        .ok_or_else(|| ParseError::MissingSeries(settings.series_key_pattern.clone()))?;
    let series = series
        .as_object()
        .ok_or_else(|| ParseError::MalformedSeries(series_key.clone()))?;

    let symbol = metadata_symbol(object).unwrap_or(default_symbol).to_string();

    let mut rows = Vec::with_capacity(series.len());
    for (date_key, entry) in series {
        let date = NaiveDate::parse_from_str(date_key, "%Y-%m-%d")
            .map_err(|_| ParseError::InvalidDate(date_key.clone()))?;
        let entry = entry
            .as_object()
            .ok_or_else(|| ParseError::MalformedEntry(date_key.clone()))?;

        let labels = &settings.labels;
        let close = price(entry, &labels.close, date_key);
        let adjusted_close = match &settings.adjusted_close {
            AdjustedClose::MirrorClose => close,
            AdjustedClose::Field { label } => match numeric(entry, label) {
                Ok(Some(value)) if value.is_finite() && value >= 0.0 => value,
                _ => close,
            },
        };

        let row = QuoteRow {
            symbol: symbol.clone(),
            date,
            open: price(entry, &labels.open, date_key),
            high: price(entry, &labels.high, date_key),
            low: price(entry, &labels.low, date_key),
            close,
            adjusted_close,
            volume: volume(entry, &labels.volume, date_key),
        };
        row.validate()
            .map_err(|e| ParseError::InvalidRow(date_key.clone(), e))?;
        rows.push(row);
    }

    tracing::debug!(symbol = %symbol, series = %series_key, rows = rows.len(), "Parsed time series.");
    Ok(rows)
}

fn metadata_symbol(object: &Map<String, Value>) -> Option<&str> {
    object
        .get(META_DATA_KEY)
        .and_then(|meta| meta.get(META_SYMBOL_KEY))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty())
}

/// `Ok(None)` for an absent, null or blank field; `Err` carries the raw value
/// of a field that is present but not a number.
fn numeric(entry: &Map<String, Value>, label: &str) -> Result<Option<f64>, String> {
    match entry.get(label) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_f64().map(Some).ok_or_else(|| number.to_string()),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => text.trim().parse::<f64>().map(Some).map_err(|_| text.clone()),
        Some(other) => Err(other.to_string()),
    }
}

fn price(entry: &Map<String, Value>, label: &str, date: &str) -> f64 {
    match numeric(entry, label) {
        Ok(Some(value)) if value.is_finite() && value >= 0.0 => value,
        Ok(Some(value)) => {
            tracing::warn!(date, field = label, value, "Out-of-range price, defaulting to zero.");
            0.0
        }
        Ok(None) => 0.0,
        Err(raw) => {
            tracing::warn!(date, field = label, raw = %raw, "Malformed price, defaulting to zero.");
            0.0
        }
    }
}

fn volume(entry: &Map<String, Value>, label: &str, date: &str) -> i64 {
    if let Some(Value::String(text)) = entry.get(label) {
        if let Ok(whole) = text.trim().parse::<i64>() {
            if whole >= 0 {
                return whole;
            }
        }
    }
    if let Some(Value::Number(number)) = entry.get(label) {
        if let Some(whole) = number.as_i64().filter(|v| *v >= 0) {
            return whole;
        }
    }

    match numeric(entry, label) {
        Ok(Some(value)) if value.is_finite() && value >= 0.0 && value <= i64::MAX as f64 => {
            value.trunc() as i64
        }
        Ok(None) => 0,
        Ok(Some(value)) => {
            tracing::warn!(date, field = label, value, "Out-of-range volume, defaulting to zero.");
            0
        }
        Err(raw) => {
            tracing::warn!(date, field = label, raw = %raw, "Malformed volume, defaulting to zero.");
            0
        }
    }
}
