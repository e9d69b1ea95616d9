#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fetcher/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core contract and building blocks for market data fetchers.
//!
//! This crate provides:
//!
//! - [`DataFetcher`](provider::DataFetcher) - Capability contract for a fetcher
//! - [`Symbol`](types::Symbol), [`DateRange`](types::DateRange) - Request types
//! - [`StandardBar`](types::StandardBar), [`CompanyInfo`](types::CompanyInfo) - Output types
//! - [`normalize`](normalize::normalize) - Provider frame to standard schema
//! - [`RetryPolicy`](retry::RetryPolicy) - Explicit retry/backoff policy

/// Error types for fetch operations.
pub mod error;
/// Column mapping and enrichment into the standard schema.
pub mod normalize;
/// The fetcher capability contract.
pub mod provider;
/// Retry policy with exponential backoff.
pub mod retry;
/// Core data types (Symbol, DateRange, StandardBar, CompanyInfo).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{DataFetchError, Result, SourceError};
pub use normalize::{normalize, to_bars};
pub use provider::{DEFAULT_LOOKBACK_DAYS, DataFetcher};
pub use retry::{Backoff, RetryPolicy};
pub use types::{CompanyInfo, DateRange, STANDARD_COLUMNS, StandardBar, Symbol};
