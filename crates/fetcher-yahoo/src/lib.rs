#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fetcher/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! US market fetcher backed by Yahoo Finance.
//!
//! This crate provides [`UsMarketFetcher`], which implements the
//! [`DataFetcher`](fetcher_core::DataFetcher) contract from `fetcher-core`
//! for US equities, ETFs and indices.
//!
//! # Features
//!
//! - Daily bars auto-adjusted for splits and dividends
//! - Retry with exponential backoff on connection failures and timeouts
//! - Normalization into the standard `code, date, open, ... pct_chg` schema
//! - Best-effort company fundamentals (market cap, P/E, sector, ...)
//!
//! # Example
//!
//! ```no_run
//! use fetcher_yahoo::UsMarketFetcher;
//! use fetcher_core::{DataFetcher, Symbol};
//! use chrono::NaiveDate;
//!
//! # async fn example() -> fetcher_core::Result<()> {
//! let fetcher = UsMarketFetcher::new();
//! let symbol = Symbol::new("AAPL");
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
//!
//! let df = fetcher.fetch_daily_data(&symbol, start, end).await?;
//! println!("Fetched {} rows", df.height());
//!
//! if let Some(info) = fetcher.fetch_company_info(&symbol).await {
//!     println!("{} ({})", info.name, info.sector);
//! }
//! # Ok(())
//! # }
//! ```

/// The US market fetcher.
pub mod fetcher;
/// Outbound provider seam.
pub mod source;
/// Yahoo Finance source.
pub mod yahoo;

pub use fetcher::{FETCHER_NAME, FETCHER_PRIORITY, UsMarketFetcher};
pub use source::{MarketDataSource, TickerInfo};
pub use yahoo::YahooSource;
