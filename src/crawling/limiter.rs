//! Global cap on records written in one run

use super::error::{CrawlError, CrawlResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct EntryLimiter {
    max_entries: Option<usize>,
    written: usize,
}

impl EntryLimiter {
    #[must_use]
    pub const fn new(max_entries: Option<usize>) -> Self {
        Self {
            max_entries,
            written: 0,
        }
    }

    /// Fails when the cap is already met, so the caller never writes past it
    pub fn admit(&self) -> CrawlResult<()> {
        match self.max_entries {
            Some(max_entries) if self.written >= max_entries => {
                Err(CrawlError::LimitReached { max_entries })
            }
            _ => Ok(()),
        }
    }

    /// Counts one written record; checks the cap before counting
    pub fn record_emitted(&mut self) -> CrawlResult<()> {
        self.admit()?;
        self.written += 1;
        Ok(())
    }

    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }

    #[must_use]
    pub const fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }
}
