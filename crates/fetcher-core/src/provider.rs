//! The fetcher capability contract.
//!
//! A [`DataFetcher`] adapts one upstream source to the standard daily-bar
//! schema. Fetchers are selected by an outside policy using their
//! [`name`](DataFetcher::name) and [`priority`](DataFetcher::priority).

use async_trait::async_trait;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::fmt::Debug;

use crate::{
    error::Result,
    normalize::to_bars,
    types::{CompanyInfo, DateRange, StandardBar, Symbol},
};

/// Default window for [`DataFetcher::fetch_recent_data`], in calendar days.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Uniform data-retrieval contract implemented by every fetcher.
#[async_trait]
pub trait DataFetcher: Send + Sync + Debug {
    /// Returns the name of this fetcher.
    fn name(&self) -> &str;

    /// Returns the selection priority; lower values are tried first.
    fn priority(&self) -> u32;

    /// Fetches daily bars for `symbol` over `[start, end]`.
    ///
    /// Returns a DataFrame with columns `code`, then the available subset of
    /// [`STANDARD_COLUMNS`](crate::STANDARD_COLUMNS). Never returns an empty
    /// frame: no rows is an error.
    async fn fetch_daily_data(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame>;

    /// Fetches fundamental company metrics.
    ///
    /// Best effort: any failure is logged and yields `None`.
    async fn fetch_company_info(&self, symbol: &Symbol) -> Option<CompanyInfo>;

    /// Fetches daily bars as typed records.
    async fn fetch_daily_bars(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StandardBar>> {
        let df = self.fetch_daily_data(symbol, start, end).await?;
        to_bars(&df)
    }

    /// Fetches daily bars for the `days` calendar days ending today.
    async fn fetch_recent_data(&self, symbol: &Symbol, days: u32) -> Result<DataFrame> {
        let range = DateRange::last_days(days);
        self.fetch_daily_data(symbol, range.start, range.end).await
    }
}
