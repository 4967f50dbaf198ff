//! Flanco price tracker
//!
//! Walks the flanco.ro catalog through a remote browser session and appends
//! one CSV row per product price observation.

pub mod cli;
pub mod crawling;
pub mod domain;
pub mod infrastructure;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crawling::{CrawlError, CrawlOrchestrator, CrawlSession, RunSummary};
pub use domain::{PriceRecord, RunMode};
pub use infrastructure::AppConfig;
