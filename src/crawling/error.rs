//! Crawl error taxonomy and recovery policy
//!
//! Every fault the crawler sees is reduced to one of five kinds. What happens
//! next is decided by [`recovery_for`], a table keyed by kind and by the stage
//! the fault occurred in.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::infrastructure::browser::SessionError;
use crate::infrastructure::record_sink::SinkError;

/// Closed set of fault kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Stale,
    Timeout,
    LimitReached,
    Other,
}

/// Where in the walk a fault happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Run setup: catalog root, category menu, search page
    Startup,
    /// Loading a listing page and waiting for its grid
    PageLoad,
    /// Enumerating the entries of a rendered grid
    Grid,
    /// Processing a single product
    Entry,
    /// Locating or activating the next-page control
    NextControl,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Startup => "startup",
            Self::PageLoad => "page load",
            Self::Grid => "grid",
            Self::Entry => "entry",
            Self::NextControl => "next control",
        };
        f.write_str(name)
    }
}

/// What the walk does about a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recovery {
    /// Drop the current product, continue with the next one
    SkipItem,
    /// Drop the rest of this page, still try to advance
    AbandonPage,
    /// Stop this category, continue with the next one
    AbandonCategory,
    /// End the run with an error
    AbortRun,
    /// End the run cleanly
    StopRun,
}

/// Recovery table
#[must_use]
pub const fn recovery_for(kind: ErrorKind, stage: Stage) -> Recovery {
    match (kind, stage) {
        (ErrorKind::LimitReached, _) => Recovery::StopRun,
        (_, Stage::Startup) => Recovery::AbortRun,
        (_, Stage::PageLoad | Stage::NextControl) => Recovery::AbandonCategory,
        (_, Stage::Grid) => Recovery::AbandonPage,
        (_, Stage::Entry) => Recovery::SkipItem,
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrawlError {
    #[error("Element not found: {what} ({locator})")]
    NotFound { what: String, locator: String },

    #[error("Stale element reference while reading {context}")]
    Stale { context: String },

    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("Already reached maximum amount of records ({max_entries})")]
    LimitReached { max_entries: usize },

    #[error("{message}")]
    Other { message: String },
}

impl CrawlError {
    pub fn not_found(what: &str, locator: impl fmt::Display) -> Self {
        Self::NotFound {
            what: what.to_string(),
            locator: locator.to_string(),
        }
    }

    pub fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            waited,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Stale { .. } => ErrorKind::Stale,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::LimitReached { .. } => ErrorKind::LimitReached,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    #[must_use]
    pub const fn recovery(&self, stage: Stage) -> Recovery {
        recovery_for(self.kind(), stage)
    }
}

impl From<SessionError> for CrawlError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::StaleReference { context } => Self::Stale { context },
            SessionError::Timeout { context } => Self::Timeout {
                what: context,
                waited: Duration::ZERO,
            },
            other @ (SessionError::Navigation { .. } | SessionError::Driver { .. }) => {
                Self::other(other.to_string())
            }
        }
    }
}

impl From<SinkError> for CrawlError {
    fn from(error: SinkError) -> Self {
        Self::other(error.to_string())
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;
