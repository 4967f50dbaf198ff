//! Per-run crawl state
//!
//! Everything that accumulates during a run lives here: the seen-id set, the
//! entry counter and the progress checkpoint. Only the orchestrator mutates it.

use std::path::{Path, PathBuf};
use tracing::{info, trace};
use uuid::Uuid;

use super::dedup::DedupTracker;
use super::error::CrawlResult;
use super::limiter::EntryLimiter;
use crate::domain::PriceRecord;
use crate::infrastructure::record_sink::RecordSink;

#[derive(Debug, Clone)]
pub struct CrawlSession {
    run_id: Uuid,
    sink_directory: PathBuf,
    seen: DedupTracker,
    limiter: EntryLimiter,
    progress_interval: usize,
    last_checkpoint: usize,
}

impl CrawlSession {
    #[must_use]
    pub fn new(
        sink_directory: impl Into<PathBuf>,
        max_entries: Option<usize>,
        progress_interval: usize,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            sink_directory: sink_directory.into(),
            seen: DedupTracker::new(),
            limiter: EntryLimiter::new(max_entries),
            progress_interval: progress_interval.max(1),
            last_checkpoint: 0,
        }
    }

    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub fn sink_directory(&self) -> &Path {
        &self.sink_directory
    }

    #[must_use]
    pub fn has_seen(&self, product_id: &str) -> bool {
        self.seen.has_seen(product_id)
    }

    #[must_use]
    pub const fn records_written(&self) -> usize {
        self.limiter.written()
    }

    #[must_use]
    pub const fn max_entries(&self) -> Option<usize> {
        self.limiter.max_entries()
    }

    /// Checks the cap, appends the record, then counts it and marks its id
    ///
    /// Nothing is written once the cap is met; `LimitReached` comes back instead.
    /// A sink failure leaves the counter and the seen set untouched.
    pub fn persist<S: RecordSink>(&mut self, sink: &mut S, record: &PriceRecord) -> CrawlResult<()> {
        self.limiter.admit()?;
        sink.append(record)?;
        self.limiter.record_emitted()?;
        self.seen.mark_seen(record.product_id());

        trace!(
            discounted = record.is_discounted(),
            "Recorded product {} original={} current={} at {} ({})",
            record.product_id(),
            record.original_price(),
            record.current_price(),
            record.captured().format(crate::domain::CAPTURED_AT_FORMAT),
            record.source_url()
        );

        let written = self.records_written();
        if written - self.last_checkpoint >= self.progress_interval {
            info!("Added {} records so far", written);
            self.last_checkpoint = written;
        }

        Ok(())
    }
}
