//! # Crawling
//!
//! The extraction engine: fallback locator resolution, price normalization,
//! run-wide deduplication, the entry cap, and the orchestrator walking
//! categories and search results.

pub mod dedup;
pub mod error;
pub mod limiter;
pub mod orchestrator;
pub mod price;
pub mod resolver;
pub mod session;
pub mod waiting;

pub use dedup::DedupTracker;
pub use error::{CrawlError, CrawlResult, ErrorKind, Recovery, Stage, recovery_for};
pub use limiter::EntryLimiter;
pub use orchestrator::{CategorySummary, CrawlOrchestrator, CrawlSettings, RunStop, RunSummary, StageFault};
pub use price::{ExtractedPrices, extract_prices, normalize_price};
pub use resolver::{ResolvedPair, SelectorResolver};
pub use session::CrawlSession;
pub use waiting::{PageWaiter, poll_for, poll_until};
