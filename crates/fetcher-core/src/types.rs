//! Core data types for daily market data.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Symbol`] - Trading symbol/ticker
//! - [`DateRange`] - Inclusive calendar date range
//! - [`StandardBar`] - One row of the standard daily-bar schema
//! - [`CompanyInfo`] - Fundamental company metrics

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataFetchError, Result};

/// Standard daily-bar columns, in output order. `code` is always prepended.
pub const STANDARD_COLUMNS: [&str; 8] = [
    "date", "open", "high", "low", "close", "volume", "amount", "pct_chg",
];

/// Maximum length of a plain equity/ETF ticker.
const MAX_TICKER_LEN: usize = 5;

/// A trading symbol/ticker.
///
/// Symbols are uppercased on creation but otherwise kept as given, so the
/// requested code can be echoed back to callers. Use [`Symbol::normalized`]
/// for the form sent to a provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the provider form of this symbol: trimmed and uppercased.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self(self.0.trim().to_uppercase())
    }

    /// Returns true if this is a caret-prefixed index code such as `^GSPC`.
    #[must_use]
    pub fn is_index(&self) -> bool {
        self.0.starts_with('^')
    }

    /// Returns true if the symbol looks like a US index, equity or ETF code:
    /// a `^` prefix, or 1-5 letters.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.is_index()
            || (!self.0.is_empty()
                && self.0.chars().count() <= MAX_TICKER_LEN
                && self.0.chars().all(char::is_alphabetic))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Inclusive calendar date range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First day of the range.
    pub start: NaiveDate,
    /// Last day of the range (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Provider-native date format.
    pub const FORMAT: &'static str = "%Y-%m-%d";

    /// Creates a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DataFetchError::InvalidParameter(format!(
                "Start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses a range from `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), Self::FORMAT).map_err(|e| {
                DataFetchError::InvalidParameter(format!("Invalid date '{s}': {e}"))
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// The `days` calendar days ending today (UTC).
    #[must_use]
    pub fn last_days(days: u32) -> Self {
        let end = Utc::now().date_naive();
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(Self::FORMAT),
            self.end.format(Self::FORMAT)
        )
    }
}

/// One trading day in the standard schema.
///
/// Price and volume fields are optional because a provider may omit a column;
/// omitted columns are never synthesized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardBar {
    /// Uppercased symbol as requested.
    pub code: String,
    /// Trading day.
    pub date: NaiveDate,
    /// Opening price.
    pub open: Option<f64>,
    /// Highest price of the day.
    pub high: Option<f64>,
    /// Lowest price of the day.
    pub low: Option<f64>,
    /// Closing price.
    pub close: Option<f64>,
    /// Traded volume.
    pub volume: Option<f64>,
    /// Approximate turnover, `volume * close`.
    pub amount: f64,
    /// Percent change of close vs. the previous day.
    pub pct_chg: Option<f64>,
}

/// Fundamental company metrics.
///
/// Every field has its own fallback when the provider omits it: numbers
/// default to `0.0`, text to `"N/A"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    /// Stock symbol.
    pub symbol: String,
    /// Company name.
    pub name: String,
    /// Market capitalization.
    pub market_cap: f64,
    /// Trailing price-to-earnings ratio.
    pub pe_ratio: f64,
    /// Forward price-to-earnings ratio.
    pub forward_pe: f64,
    /// Price-to-book ratio.
    pub pb_ratio: f64,
    /// Dividend yield.
    pub dividend_yield: f64,
    /// 52-week high price.
    pub fifty_two_week_high: f64,
    /// 52-week low price.
    pub fifty_two_week_low: f64,
    /// Business sector.
    pub sector: String,
    /// Industry within the sector.
    pub industry: String,
}

impl CompanyInfo {
    /// Placeholder for missing text fields.
    pub const NOT_AVAILABLE: &'static str = "N/A";
}
