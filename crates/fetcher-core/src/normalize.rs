//! Reshape provider-native daily bars into the standard schema.
//!
//! Provider frames carry `Date, Open, High, Low, Close, Volume`. [`normalize`]
//! renames them, derives `pct_chg` and `amount`, stamps `code`, and projects
//! onto `["code"] + STANDARD_COLUMNS`. Columns the provider did not send are
//! left out rather than synthesized.

use chrono::{Duration, NaiveDate};
use polars::prelude::*;

use crate::error::{DataFetchError, Result};
use crate::types::{STANDARD_COLUMNS, StandardBar, Symbol};

/// Provider-native to standard column names.
pub const COLUMN_MAPPING: [(&str, &str); 6] = [
    ("Date", "date"),
    ("Open", "open"),
    ("High", "high"),
    ("Low", "low"),
    ("Close", "close"),
    ("Volume", "volume"),
];

/// Normalize a provider frame for `code`.
///
/// `code` is stamped on every row as given; callers pass the requested
/// symbol, not the provider form.
pub fn normalize(raw: &DataFrame, code: &Symbol) -> Result<DataFrame> {
    let mut df = raw.clone();

    for (from, to) in COLUMN_MAPPING {
        if has_column(&df, from) {
            df.rename(from, to.into())?;
        }
    }

    let close = float_values(&df, "close")?;
    if let Some(close) = &close {
        df.with_column(Column::new("pct_chg".into(), pct_change(close)))?;
    }

    // Turnover approximated as volume * close.
    let amount = match (float_values(&df, "volume")?, &close) {
        (Some(volume), Some(close)) => turnover(&volume, close),
        _ => vec![0.0; df.height()],
    };
    df.with_column(Column::new("amount".into(), amount))?;

    let codes = vec![code.as_str(); df.height()];
    df.with_column(Column::new("code".into(), codes))?;

    let keep: Vec<&str> = std::iter::once("code")
        .chain(STANDARD_COLUMNS)
        .filter(|name| has_column(&df, name))
        .collect();

    Ok(df.select(keep)?)
}

/// Convert a standard frame into typed bars.
pub fn to_bars(df: &DataFrame) -> Result<Vec<StandardBar>> {
    let codes = required(df, "code")?.cast(&DataType::String)?;
    let codes = codes.as_materialized_series().str()?;
    let days = required(df, "date")?
        .cast(&DataType::Date)?
        .cast(&DataType::Int32)?;
    let days = days.as_materialized_series().i32()?;

    let open = optional_floats(df, "open")?;
    let high = optional_floats(df, "high")?;
    let low = optional_floats(df, "low")?;
    let close = optional_floats(df, "close")?;
    let volume = optional_floats(df, "volume")?;
    let amount = optional_floats(df, "amount")?;
    let pct_chg = float_values(df, "pct_chg")?;

    // NaiveDate's default is 1970-01-01.
    let epoch = NaiveDate::default();

    codes
        .into_iter()
        .zip(days)
        .enumerate()
        .map(|(i, (code, day))| {
            let code = code.ok_or_else(|| DataFetchError::Frame(format!("Null code at row {i}")))?;
            let date = day
                .and_then(|d| epoch.checked_add_signed(Duration::days(i64::from(d))))
                .ok_or_else(|| DataFetchError::Frame(format!("Invalid date at row {i}")))?;

            Ok(StandardBar {
                code: code.to_string(),
                date,
                open: open[i],
                high: high[i],
                low: low[i],
                close: close[i],
                volume: volume[i],
                amount: amount[i].unwrap_or(0.0),
                pct_chg: pct_chg.as_ref().and_then(|p| p[i]),
            })
        })
        .collect()
}

/// Percent change of each value vs. the last non-null one before it.
///
/// The first row, rows without a previous value and rows following a zero
/// are 0.0. Results are rounded to 2 decimals.
#[must_use]
pub fn pct_change(values: &[Option<f64>]) -> Vec<f64> {
    let mut previous: Option<f64> = None;
    values
        .iter()
        .map(|&current| {
            let pct = match (previous, current) {
                (Some(p), Some(c)) if p != 0.0 => round2((c / p - 1.0) * 100.0),
                _ => 0.0,
            };
            if current.is_some() {
                previous = current;
            }
            pct
        })
        .collect()
}

/// Row-wise `volume * close`, rounded to 2 decimals, 0.0 where either is null.
#[must_use]
pub fn turnover(volume: &[Option<f64>], close: &[Option<f64>]) -> Vec<f64> {
    volume
        .iter()
        .zip(close)
        .map(|pair| match pair {
            (Some(v), Some(c)) => round2(v * c),
            _ => 0.0,
        })
        .collect()
}

/// Round to 2 decimals, ties to even, so `0.125` becomes `0.12`.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

fn required<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| DataFetchError::Frame(format!("Missing column '{name}'")))
}

fn float_values(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let column = column.cast(&DataType::Float64)?;
    let values = column.as_materialized_series().f64()?.into_iter().collect();
    Ok(Some(values))
}

fn optional_floats(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(float_values(df, name)?.unwrap_or_else(|| vec![None; df.height()]))
}
