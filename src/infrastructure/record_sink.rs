//! Append-only record persistence
//!
//! Each product id gets its own CSV log `product{id}.csv`; every call appends
//! exactly one row and never rewrites earlier rows.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::domain::PriceRecord;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to prepare output directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write record for product {product_id}: {source}")]
    Write {
        product_id: String,
        source: csv::Error,
    },

    #[error("Product id {0:?} cannot be used as a file name")]
    InvalidProductId(String),
}

/// Durable destination for price records
pub trait RecordSink {
    fn append(&mut self, record: &PriceRecord) -> Result<(), SinkError>;

    /// Directory (or other location) records end up in, for diagnostics
    fn location(&self) -> PathBuf;
}

/// One CSV file per product under a directory
#[derive(Debug, Clone)]
pub struct CsvRecordSink {
    directory: PathBuf,
}

impl CsvRecordSink {
    /// Creates the directory if it does not exist yet
    pub fn create(directory: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|source| SinkError::Directory {
            path: directory.clone(),
            source,
        })?;
        Ok(Self { directory })
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File holding the history of one product
    pub fn path_for(&self, product_id: &str) -> Result<PathBuf, SinkError> {
        let usable = !product_id.is_empty()
            && product_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !usable {
            return Err(SinkError::InvalidProductId(product_id.to_string()));
        }
        Ok(self.directory.join(format!("product{product_id}.csv")))
    }
}

impl RecordSink for CsvRecordSink {
    fn append(&mut self, record: &PriceRecord) -> Result<(), SinkError> {
        let path = self.path_for(record.product_id())?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;

        let write_error = |source: csv::Error| SinkError::Write {
            product_id: record.product_id().to_string(),
            source,
        };

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(b',')
            .quote(b'"')
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(file);
        writer.write_record(record.to_row()).map_err(write_error)?;
        writer
            .flush()
            .map_err(|e| write_error(csv::Error::from(e)))?;

        debug!("Appended record to {}", path.display());
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.directory.clone()
    }
}
