//! The US market fetcher.

use async_trait::async_trait;
use chrono::NaiveDate;
use fetcher_core::{
    CompanyInfo, DataFetchError, DataFetcher, DateRange, Result, RetryPolicy, Symbol, normalize,
};
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::source::{MarketDataSource, TickerInfo};
use crate::yahoo::YahooSource;

/// Name reported to fetcher-selection policies.
pub const FETCHER_NAME: &str = "USMarketFetcher";

/// Priority reported to fetcher-selection policies; primary source for US equities.
pub const FETCHER_PRIORITY: u32 = 1;

/// Daily bars and company info for US equities, ETFs and indices.
///
/// Implements [`DataFetcher`] on top of any [`MarketDataSource`], Yahoo
/// Finance by default. Bar downloads go through a [`RetryPolicy`]; company
/// info lookups are made once and never fail loudly.
#[derive(Debug)]
pub struct UsMarketFetcher<S = YahooSource> {
    source: S,
    retry: RetryPolicy,
}

impl UsMarketFetcher<YahooSource> {
    /// Create a fetcher backed by Yahoo Finance with the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_source(YahooSource::new())
    }

    /// Create a fetcher backed by Yahoo Finance using a custom HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self::with_source(YahooSource::with_client(client))
    }
}

impl Default for UsMarketFetcher<YahooSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MarketDataSource> UsMarketFetcher<S> {
    /// Create a fetcher over an arbitrary source.
    #[must_use]
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used for bar downloads.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the retry policy used for bar downloads.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the underlying source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Trim and uppercase a symbol for the provider.
    ///
    /// Unusual shapes are logged and passed through unchanged.
    fn provider_symbol(&self, symbol: &Symbol) -> Symbol {
        let code = symbol.normalized();
        if !code.is_well_formed() {
            warn!(symbol = %code, "Symbol may be malformed, fetching anyway");
        }
        code
    }

    /// Download raw bars, retrying transient failures.
    async fn fetch_raw_data(&self, symbol: &Symbol, range: DateRange) -> Result<DataFrame> {
        let code = self.provider_symbol(symbol);
        debug!(
            source = self.source.name(),
            symbol = %code,
            range = %range,
            "Downloading daily bars"
        );

        let source = &self.source;
        let code_ref = &code;
        let raw = self
            .retry
            .run("download_bars", move || source.download_bars(code_ref, range))
            .await
            .map_err(|e| DataFetchError::provider(self.source.name(), e))?;

        if raw.height() == 0 {
            return Err(DataFetchError::Empty {
                symbol: symbol.to_string(),
                start: range.start.format(DateRange::FORMAT).to_string(),
                end: range.end.format(DateRange::FORMAT).to_string(),
            });
        }

        Ok(raw)
    }
}

#[async_trait]
impl<S: MarketDataSource> DataFetcher for UsMarketFetcher<S> {
    fn name(&self) -> &str {
        FETCHER_NAME
    }

    fn priority(&self) -> u32 {
        FETCHER_PRIORITY
    }

    async fn fetch_daily_data(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame> {
        let range = DateRange::new(start, end)?;
        let raw = self.fetch_raw_data(symbol, range).await?;
        let df = normalize(&raw, symbol)?;
        debug!(symbol = %symbol, rows = df.height(), "Fetched daily bars");
        Ok(df)
    }

    async fn fetch_company_info(&self, symbol: &Symbol) -> Option<CompanyInfo> {
        let code = self.provider_symbol(symbol);
        match self.source.ticker_info(&code).await {
            Ok(info) => Some(company_info(&info, symbol)),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to fetch company info");
                None
            }
        }
    }
}

/// Map provider fields onto [`CompanyInfo`], defaulting each one separately.
fn company_info(info: &TickerInfo, symbol: &Symbol) -> CompanyInfo {
    let number = |key: &str| info.number(key).unwrap_or(0.0);
    let text = |key: &str| {
        info.text(key)
            .unwrap_or(CompanyInfo::NOT_AVAILABLE)
            .to_string()
    };

    CompanyInfo {
        symbol: info.text("symbol").unwrap_or(symbol.as_str()).to_string(),
        name: info
            .text("longName")
            .or_else(|| info.text("shortName"))
            .unwrap_or(CompanyInfo::NOT_AVAILABLE)
            .to_string(),
        market_cap: number("marketCap"),
        pe_ratio: number("trailingPE"),
        forward_pe: number("forwardPE"),
        pb_ratio: number("priceToBook"),
        dividend_yield: number("dividendYield"),
        fifty_two_week_high: number("fiftyTwoWeekHigh"),
        fifty_two_week_low: number("fiftyTwoWeekLow"),
        sector: text("sector"),
        industry: text("industry"),
    }
}
