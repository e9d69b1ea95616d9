//! Yahoo Finance implementation of [`MarketDataSource`].

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use fetcher_core::{DateRange, SourceError, Symbol};
use polars::prelude::*;
use reqwest::header::{REFERER, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::source::{MarketDataSource, TickerInfo};

/// Yahoo Finance chart API base URL.
pub const CHART_API_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance quote summary API base URL.
pub const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Page that hands out the session cookie the crumb is bound to.
pub const COOKIE_URL: &str = "https://fc.yahoo.com";

/// Endpoint returning the crumb required by the quote summary API.
pub const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";

const FINANCE_REFERER: &str = "https://finance.yahoo.com/";

/// Quote summary modules that together carry the company info fields.
const SUMMARY_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,assetProfile";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

const PROVIDER_NAME: &str = "Yahoo Finance";

/// Yahoo Finance market data source.
///
/// Chart requests are anonymous. Quote summary requests carry a crumb that is
/// fetched once per session (cookie, then crumb) and reused until Yahoo
/// rejects it with a 401.
#[derive(Debug, Clone)]
pub struct YahooSource {
    client: reqwest::Client,
    chart_url: String,
    summary_url: String,
    cookie_url: String,
    crumb_url: String,
    crumb: Arc<RwLock<Option<String>>>,
}

impl YahooSource {
    /// Create a source with the default HTTP client and endpoints.
    #[must_use]
    pub fn new() -> Self {
        let client = build_client().unwrap_or_else(|e| {
            warn!(
                error = %e,
                "Failed to build HTTP client, falling back to defaults without cookie store"
            );
            reqwest::Client::new()
        });
        Self::with_client(client)
    }

    /// Create a source using the provided HTTP client.
    ///
    /// Company info lookups need the client to keep cookies
    /// (`reqwest::ClientBuilder::cookie_store`).
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            chart_url: CHART_API_URL.to_string(),
            summary_url: QUOTE_SUMMARY_URL.to_string(),
            cookie_url: COOKIE_URL.to_string(),
            crumb_url: CRUMB_URL.to_string(),
            crumb: Arc::default(),
        }
    }

    /// Point the source at different chart and quote summary endpoints.
    #[must_use]
    pub fn with_base_urls(
        mut self,
        chart_url: impl Into<String>,
        summary_url: impl Into<String>,
    ) -> Self {
        self.chart_url = chart_url.into();
        self.summary_url = summary_url.into();
        self
    }

    /// Point the source at different session cookie and crumb endpoints.
    #[must_use]
    pub fn with_auth_urls(
        mut self,
        cookie_url: impl Into<String>,
        crumb_url: impl Into<String>,
    ) -> Self {
        self.cookie_url = cookie_url.into();
        self.crumb_url = crumb_url.into();
        self
    }

    /// Build the chart API URL for a symbol and inclusive date range.
    fn build_chart_url(&self, symbol: &Symbol, range: DateRange) -> String {
        let start_ts = range
            .start
            .and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
            .unwrap_or(0);

        let end_ts = range
            .end
            .and_hms_opt(23, 59, 59)
            .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
            .unwrap_or(0);

        format!(
            "{}/{}?period1={}&period2={}&interval=1d&includeAdjustedClose=true",
            self.chart_url,
            symbol.as_str(),
            start_ts,
            end_ts,
        )
    }

    /// Build the quote summary URL for a symbol, without the crumb.
    fn build_summary_url(&self, symbol: &Symbol) -> String {
        format!(
            "{}/{}?modules={}",
            self.summary_url,
            symbol.as_str(),
            SUMMARY_MODULES
        )
    }

    fn cached_crumb(&self) -> Option<String> {
        self.crumb.read().ok().and_then(|crumb| crumb.clone())
    }

    fn invalidate_crumb(&self) {
        if let Ok(mut crumb) = self.crumb.write() {
            *crumb = None;
        }
    }

    /// Return the session crumb, fetching cookie and crumb if none is cached.
    async fn crumb(&self) -> Result<String, SourceError> {
        if let Some(crumb) = self.cached_crumb() {
            return Ok(crumb);
        }

        // Only the Set-Cookie matters here; fc.yahoo.com answers 404.
        self.client
            .get(&self.cookie_url)
            .header(REFERER, FINANCE_REFERER)
            .send()
            .await
            .map_err(transport_error)?;

        let response = self
            .client
            .get(&self.crumb_url)
            .header(REFERER, FINANCE_REFERER)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&response));
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("{PROVIDER_NAME} crumb request"),
            });
        }

        let body = response.text().await.map_err(transport_error)?;
        let crumb = body.trim();
        if crumb.is_empty()
            || crumb.len() >= 100
            || crumb.contains('<')
            || crumb.contains(char::is_whitespace)
        {
            let preview: String = crumb.chars().take(40).collect();
            return Err(SourceError::Parse(format!("Unexpected crumb response: {preview}")));
        }

        debug!("Obtained {} crumb", PROVIDER_NAME);
        if let Ok(mut cached) = self.crumb.write() {
            *cached = Some(crumb.to_string());
        }
        Ok(crumb.to_string())
    }

    /// Send a request and decode the JSON body, classifying failures.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        symbol: &Symbol,
    ) -> Result<T, SourceError> {
        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&response));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::SymbolNotFound(symbol.to_string()));
        }

        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("{PROVIDER_NAME} request for {symbol}"),
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                SourceError::Parse(e.to_string())
            } else {
                transport_error(e)
            }
        })
    }

    /// Parse a chart response into a provider-native, auto-adjusted frame.
    fn parse_chart_response(
        &self,
        symbol: &Symbol,
        response: ChartResponse,
    ) -> Result<DataFrame, SourceError> {
        if let Some(error) = response.chart.error {
            if error.code == "Not Found" {
                return Err(SourceError::SymbolNotFound(symbol.to_string()));
            }
            return Err(SourceError::Other(format!(
                "{}: {}",
                error.code, error.description
            )));
        }

        let result = response
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::SymbolNotFound(symbol.to_string()))?;

        let timestamps = result.timestamp.unwrap_or_default();
        if timestamps.is_empty() {
            return Ok(DataFrame::empty());
        }

        let gmt_offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

        let mut quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::Parse("Missing quote data".to_string()))?;

        let adj_close = result
            .indicators
            .adjclose
            .and_then(|ac| ac.into_iter().next())
            .map(|ac| ac.adjclose)
            .unwrap_or_default();

        if adj_close.len() == quote.close.len() {
            quote.auto_adjust(&adj_close);
        } else {
            debug!(symbol = %symbol, "No adjusted close in chart response, keeping raw prices");
        }

        // NaiveDate's default is 1970-01-01.
        let epoch = NaiveDate::default();
        let dates = timestamps
            .iter()
            .map(|&ts| {
                Utc.timestamp_opt(ts + gmt_offset, 0)
                    .single()
                    .map(|dt| (dt.date_naive() - epoch).num_days() as i32)
                    .ok_or_else(|| SourceError::Parse(format!("Invalid timestamp {ts}")))
            })
            .collect::<Result<Vec<i32>, _>>()?;

        let date_col = Column::new("Date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        // Series Yahoo leaves out (or misaligns) are omitted, not fatal.
        let rows = timestamps.len();
        let mut columns = vec![date_col];
        for (name, values) in [
            ("Open", quote.open),
            ("High", quote.high),
            ("Low", quote.low),
            ("Close", quote.close),
        ] {
            if values.len() == rows {
                columns.push(Column::new(name.into(), values));
            } else {
                debug!(symbol = %symbol, column = name, "Omitting incomplete chart series");
            }
        }
        if quote.volume.len() == rows {
            columns.push(Column::new("Volume".into(), quote.volume));
        } else {
            debug!(symbol = %symbol, column = "Volume", "Omitting incomplete chart series");
        }

        DataFrame::new(columns).map_err(|e| SourceError::Parse(e.to_string()))
    }

    /// Flatten a quote summary response into a field map.
    fn parse_summary_response(
        &self,
        symbol: &Symbol,
        response: QuoteSummaryResponse,
    ) -> Result<TickerInfo, SourceError> {
        if let Some(error) = response.quote_summary.error {
            if error.code == "Not Found" {
                return Err(SourceError::SymbolNotFound(symbol.to_string()));
            }
            return Err(SourceError::Other(format!(
                "{}: {}",
                error.code, error.description
            )));
        }

        let modules = response
            .quote_summary
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::SymbolNotFound(symbol.to_string()))?;

        let mut info = TickerInfo::new();
        for module in SUMMARY_MODULES.split(',') {
            let Some(Value::Object(fields)) = modules.get(module) else {
                continue;
            };
            for (key, value) in fields {
                if let Some(value) = flatten_value(value) {
                    info.insert_missing(key.as_str(), value);
                }
            }
        }

        Ok(info)
    }
}

impl Default for YahooSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for YahooSource {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn download_bars(
        &self,
        symbol: &Symbol,
        range: DateRange,
    ) -> Result<DataFrame, SourceError> {
        let url = self.build_chart_url(symbol, range);
        debug!("Fetching chart: {}", url);

        let response: ChartResponse = self.send_json(self.client.get(&url), symbol).await?;
        self.parse_chart_response(symbol, response)
    }

    async fn ticker_info(&self, symbol: &Symbol) -> Result<TickerInfo, SourceError> {
        let crumb = self.crumb().await?;
        let url = self.build_summary_url(symbol);
        debug!("Fetching quote summary: {}", url);

        let request = self.client.get(&url).query(&[("crumb", crumb.as_str())]);
        let response = self.send_json::<QuoteSummaryResponse>(request, symbol).await;
        if matches!(response, Err(SourceError::Http { status: 401, .. })) {
            // Stale crumb; the next lookup starts a fresh session.
            self.invalidate_crumb();
        }
        self.parse_summary_response(symbol, response?)
    }
}

fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .cookie_store(true)
        .build()
}

/// Build a rate limit error, honouring a `Retry-After` given in seconds.
fn rate_limited(response: &reqwest::Response) -> SourceError {
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    SourceError::RateLimited {
        provider: PROVIDER_NAME.to_string(),
        retry_after,
    }
}

/// Map a reqwest failure onto the transport taxonomy.
fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(e.to_string())
    } else if e.is_connect() {
        SourceError::Connection(e.to_string())
    } else {
        SourceError::Other(e.to_string())
    }
}

/// Yahoo wraps numbers as `{"raw": 1.5, "fmt": "1.50"}`; keep `raw`.
/// Empty objects and nulls carry nothing.
fn flatten_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Object(map) => map.get("raw").cloned(),
        other => Some(other.clone()),
    }
}

// ============================================================================
// Yahoo Finance API Response Types
// ============================================================================

/// Chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

impl QuoteData {
    /// Scale O/H/L by `adj_close / close` and replace close with adj_close.
    fn auto_adjust(&mut self, adj_close: &[Option<f64>]) {
        for (i, adj) in adj_close.iter().enumerate() {
            let ratio = match (self.close[i], adj) {
                (Some(close), Some(adj)) if close != 0.0 => adj / close,
                _ => continue,
            };
            for prices in [&mut self.open, &mut self.high, &mut self.low] {
                if let Some(Some(price)) = prices.get_mut(i) {
                    *price *= ratio;
                }
            }
            self.close[i] = *adj;
        }
    }
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Vec<Option<f64>>,
}

/// Quote Summary API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<ApiError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const AAPL_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "AAPL", "gmtoffset": -18000},
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open": [100.0, 100.0, null],
                        "high": [110.0, 104.0, 102.0],
                        "low": [90.0, 98.0, 100.0],
                        "close": [100.0, 102.0, 101.0],
                        "volume": [1000, 2000, 1500]
                    }],
                    "adjclose": [{"adjclose": [50.0, 51.0, 50.5]}]
                }
            }],
            "error": null
        }
    }"#;

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
        .unwrap()
    }

    const CRUMB: &str = "Xq3/ab.C9k";

    fn source_for(server: &mockito::ServerGuard) -> YahooSource {
        YahooSource::new()
            .with_base_urls(
                format!("{}/chart", server.url()),
                format!("{}/summary", server.url()),
            )
            .with_auth_urls(
                format!("{}/cookie", server.url()),
                format!("{}/crumb", server.url()),
            )
    }

    /// Serve the session cookie and crumb endpoints.
    async fn serve_auth(server: &mut mockito::ServerGuard) -> (mockito::Mock, mockito::Mock) {
        let cookie = server
            .mock("GET", "/cookie")
            .with_status(404)
            .with_header("set-cookie", "A3=d=session42; Path=/")
            .create_async()
            .await;
        let crumb = server
            .mock("GET", "/crumb")
            .match_header("cookie", Matcher::Regex("A3=d=session42".into()))
            .with_status(200)
            .with_body(CRUMB)
            .create_async()
            .await;
        (cookie, crumb)
    }

    fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .unwrap()
            .cast(&DataType::Float64)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_build_chart_url_is_end_inclusive() {
        let source = YahooSource::new();
        let url = source.build_chart_url(&Symbol::new("AAPL"), range((2024, 1, 1), (2024, 1, 31)));

        assert!(url.starts_with(CHART_API_URL));
        assert!(url.contains("/AAPL?"));
        // 2024-01-01T00:00:00Z and 2024-01-31T23:59:59Z
        assert!(url.contains("period1=1704067200"));
        assert!(url.contains("period2=1706745599"));
        assert!(url.contains("interval=1d"));
        assert!(url.contains("includeAdjustedClose=true"));
    }

    #[test]
    fn test_default_client_builds() {
        assert!(build_client().is_ok());
    }

    #[test]
    fn test_build_summary_url() {
        let source = YahooSource::new();
        let url = source.build_summary_url(&Symbol::new("^GSPC"));
        assert_eq!(
            url,
            format!("{QUOTE_SUMMARY_URL}/^GSPC?modules={SUMMARY_MODULES}")
        );
    }

    #[test]
    fn test_auto_adjust() {
        let mut quote = QuoteData {
            open: vec![Some(10.0), Some(20.0)],
            high: vec![Some(12.0), None],
            low: vec![Some(8.0), Some(18.0)],
            close: vec![Some(10.0), Some(0.0)],
            volume: vec![Some(1), Some(2)],
        };
        quote.auto_adjust(&[Some(5.0), Some(3.0)]);

        assert_eq!(quote.open, vec![Some(5.0), Some(20.0)]);
        assert_eq!(quote.high, vec![Some(6.0), None]);
        assert_eq!(quote.low, vec![Some(4.0), Some(18.0)]);
        // zero close: row left untouched
        assert_eq!(quote.close, vec![Some(5.0), Some(0.0)]);
    }

    #[test]
    fn test_flatten_value() {
        assert_eq!(flatten_value(&json!({"raw": 1.5, "fmt": "1.50"})), Some(json!(1.5)));
        assert_eq!(flatten_value(&json!({})), None);
        assert_eq!(flatten_value(&Value::Null), None);
        assert_eq!(flatten_value(&json!("Technology")), Some(json!("Technology")));
    }

    #[tokio::test]
    async fn test_download_bars_parses_and_adjusts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/chart/AAPL")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(AAPL_CHART)
            .create_async()
            .await;

        let source = source_for(&server);
        let df = source
            .download_bars(&Symbol::new("AAPL"), range((2024, 1, 1), (2024, 1, 5)))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(df.height(), 3);
        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>(),
            vec!["Date", "Open", "High", "Low", "Close", "Volume"]
        );
        assert_eq!(floats(&df, "Close"), vec![Some(50.0), Some(51.0), Some(50.5)]);
        assert_eq!(floats(&df, "Open"), vec![Some(50.0), Some(50.0), None]);
        assert_eq!(floats(&df, "Volume"), vec![Some(1000.0), Some(2000.0), Some(1500.0)]);

        let bars = fetcher_core::to_bars(&fetcher_core::normalize(&df, &Symbol::new("AAPL")).unwrap())
            .unwrap();
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[2].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    }

    #[tokio::test]
    async fn test_download_bars_without_timestamps_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/chart/AAPL")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#)
            .create_async()
            .await;

        let df = source_for(&server)
            .download_bars(&Symbol::new("AAPL"), range((2024, 1, 6), (2024, 1, 7)))
            .await
            .unwrap();
        assert_eq!(df.height(), 0);
    }

    #[tokio::test]
    async fn test_download_bars_omits_missing_series() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/chart/SPY")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"chart":{"result":[{"meta":{"gmtoffset":-18000},"timestamp":[1704205800,1704292200],"indicators":{"quote":[{"close":[470.0,467.5],"volume":[100,200]}]}}],"error":null}}"#,
            )
            .create_async()
            .await;

        let df = source_for(&server)
            .download_bars(&Symbol::new("SPY"), range((2024, 1, 1), (2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>(),
            vec!["Date", "Close", "Volume"]
        );
        assert_eq!(floats(&df, "Close"), vec![Some(470.0), Some(467.5)]);

        let bars = fetcher_core::to_bars(&fetcher_core::normalize(&df, &Symbol::new("SPY")).unwrap())
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, None);
        assert_eq!(bars[1].amount, 93_500.0);
    }

    #[tokio::test]
    async fn test_download_bars_status_classification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/chart/NOPE")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/chart/BUSY")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;
        server
            .mock("GET", "/chart/SLOW")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;
        server
            .mock("GET", "/chart/BAD")
            .match_query(Matcher::Any)
            .with_status(400)
            .create_async()
            .await;
        server
            .mock("GET", "/chart/JUNK")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let source = source_for(&server);
        let days = range((2024, 1, 1), (2024, 1, 5));

        let err = source.download_bars(&Symbol::new("NOPE"), days).await.unwrap_err();
        assert_eq!(err, SourceError::SymbolNotFound("NOPE".into()));

        let err = source.download_bars(&Symbol::new("BUSY"), days).await.unwrap_err();
        assert_eq!(
            err,
            SourceError::RateLimited {
                provider: "Yahoo Finance".into(),
                retry_after: None,
            }
        );

        let err = source.download_bars(&Symbol::new("SLOW"), days).await.unwrap_err();
        assert_eq!(
            err,
            SourceError::RateLimited {
                provider: "Yahoo Finance".into(),
                retry_after: Some(Duration::from_secs(7)),
            }
        );

        let err = source.download_bars(&Symbol::new("BAD"), days).await.unwrap_err();
        assert!(matches!(err, SourceError::Http { status: 400, .. }));
        assert!(!err.is_transient());

        let err = source.download_bars(&Symbol::new("JUNK"), days).await.unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[tokio::test]
    async fn test_download_bars_api_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/chart/ZZZZZ")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
            )
            .create_async()
            .await;

        let err = source_for(&server)
            .download_bars(&Symbol::new("ZZZZZ"), range((2024, 1, 1), (2024, 1, 5)))
            .await
            .unwrap_err();
        assert_eq!(err, SourceError::SymbolNotFound("ZZZZZ".into()));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let source = YahooSource::new()
            .with_base_urls("http://127.0.0.1:1/chart", "http://127.0.0.1:1/summary");
        let err = source
            .download_bars(&Symbol::new("AAPL"), range((2024, 1, 1), (2024, 1, 5)))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }

    #[tokio::test]
    async fn test_ticker_info_flattens_modules() {
        let body = json!({
            "quoteSummary": {
                "result": [{
                    "price": {
                        "symbol": "AAPL",
                        "longName": "Apple Inc.",
                        "shortName": "Apple",
                        "marketCap": {"raw": 2.9e12, "fmt": "2.9T"}
                    },
                    "summaryDetail": {
                        "marketCap": {"raw": 1.0, "fmt": "1"},
                        "trailingPE": {"raw": 29.5, "fmt": "29.50"},
                        "forwardPE": {"raw": 27.1, "fmt": "27.10"},
                        "dividendYield": {"raw": 0.0051, "fmt": "0.51%"},
                        "fiftyTwoWeekHigh": {"raw": 199.62, "fmt": "199.62"},
                        "fiftyTwoWeekLow": {"raw": 164.08, "fmt": "164.08"},
                        "beta": {}
                    },
                    "defaultKeyStatistics": {
                        "priceToBook": {"raw": 47.3, "fmt": "47.30"}
                    },
                    "assetProfile": {
                        "sector": "Technology",
                        "industry": "Consumer Electronics"
                    }
                }],
                "error": null
            }
        });

        let mut server = mockito::Server::new_async().await;
        let (cookie, crumb) = serve_auth(&mut server).await;
        let summary = server
            .mock("GET", "/summary/AAPL")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("modules".into(), SUMMARY_MODULES.into()),
                Matcher::UrlEncoded("crumb".into(), CRUMB.into()),
            ]))
            .match_header("cookie", Matcher::Regex("A3=d=session42".into()))
            .with_status(200)
            .with_body(body.to_string())
            .expect(2)
            .create_async()
            .await;

        let source = source_for(&server);
        let info = source.ticker_info(&Symbol::new("AAPL")).await.unwrap();
        // crumb is reused for the session
        source.ticker_info(&Symbol::new("AAPL")).await.unwrap();

        cookie.assert_async().await;
        crumb.assert_async().await;
        summary.assert_async().await;

        assert_eq!(info.text("longName"), Some("Apple Inc."));
        // price module wins over summaryDetail
        assert_eq!(info.number("marketCap"), Some(2.9e12));
        assert_eq!(info.number("trailingPE"), Some(29.5));
        assert_eq!(info.number("priceToBook"), Some(47.3));
        assert_eq!(info.text("sector"), Some("Technology"));
        assert_eq!(info.number("beta"), None);
    }

    #[tokio::test]
    async fn test_ticker_info_not_found() {
        let mut server = mockito::Server::new_async().await;
        serve_auth(&mut server).await;
        server
            .mock("GET", "/summary/ZZZZZ")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found","description":"Quote not found for ticker symbol: ZZZZZ"}}}"#,
            )
            .create_async()
            .await;

        let err = source_for(&server)
            .ticker_info(&Symbol::new("ZZZZZ"))
            .await
            .unwrap_err();
        assert_eq!(err, SourceError::SymbolNotFound("ZZZZZ".into()));
    }

    #[tokio::test]
    async fn test_ticker_info_fails_without_crumb() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cookie")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/crumb")
            .with_status(200)
            .with_body("<!DOCTYPE html><html>consent</html>")
            .create_async()
            .await;
        let summary = server
            .mock("GET", Matcher::Regex("^/summary/".into()))
            .expect(0)
            .create_async()
            .await;

        let err = source_for(&server)
            .ticker_info(&Symbol::new("AAPL"))
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Parse(_)), "{err:?}");
        summary.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_crumb_is_refetched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cookie")
            .with_status(404)
            .create_async()
            .await;
        let crumb = server
            .mock("GET", "/crumb")
            .with_status(200)
            .with_body(CRUMB)
            .expect(2)
            .create_async()
            .await;
        server
            .mock("GET", "/summary/AAPL")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"finance":{"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#)
            .create_async()
            .await;

        let source = source_for(&server);
        let err = source.ticker_info(&Symbol::new("AAPL")).await.unwrap_err();
        assert!(matches!(err, SourceError::Http { status: 401, .. }), "{err:?}");
        assert!(source.cached_crumb().is_none());

        source.ticker_info(&Symbol::new("AAPL")).await.unwrap_err();
        crumb.assert_async().await;
    }
}
