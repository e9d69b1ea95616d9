//! Outbound seam to the upstream market data provider.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use fetcher_core::{DateRange, SourceError, Symbol};
use polars::prelude::DataFrame;
use serde_json::Value;

/// An upstream market data provider.
///
/// [`UsMarketFetcher`](crate::UsMarketFetcher) talks to the provider only
/// through this trait, so the transport can be swapped or scripted.
#[async_trait]
pub trait MarketDataSource: Send + Sync + Debug {
    /// Returns the provider name used in error messages.
    fn name(&self) -> &str;

    /// Downloads split/dividend adjusted daily bars over an inclusive range.
    ///
    /// Returns a DataFrame with provider-native columns
    /// `Date, Open, High, Low, Close, Volume`. A symbol with no trading days in
    /// the range yields a frame with zero rows.
    async fn download_bars(
        &self,
        symbol: &Symbol,
        range: DateRange,
    ) -> Result<DataFrame, SourceError>;

    /// Fetches ticker metadata and fundamentals as a flat field map.
    async fn ticker_info(&self, symbol: &Symbol) -> Result<TickerInfo, SourceError>;
}

/// Flat map of provider fields, e.g. `marketCap`, `trailingPE`, `sector`.
///
/// Lookups never fail: absent or mistyped fields read as `None` and the
/// caller decides the default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickerInfo(HashMap<String, Value>);

impl TickerInfo {
    /// Creates an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, keeping an existing value for the same key.
    pub fn insert_missing(&mut self, key: impl Into<String>, value: Value) {
        self.0.entry(key.into()).or_insert(value);
    }

    /// Returns a numeric field.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// Returns a non-empty text field.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for TickerInfo {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
