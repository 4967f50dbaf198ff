//! Price record entity
//!
//! One observation of a product's prices at a point in time.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Timestamp layout used when a record is written out
pub const CAPTURED_AT_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// A single price observation, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    product_id: String,
    captured_at: DateTime<Local>,
    original_price: String,
    current_price: String,
    source_url: String,
}

impl PriceRecord {
    /// Creates a record stamped with the current local time
    #[must_use]
    pub fn capture(
        product_id: impl Into<String>,
        original_price: impl Into<String>,
        current_price: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self::captured_at(
            product_id,
            Local::now(),
            original_price,
            current_price,
            source_url,
        )
    }

    /// Creates a record with an explicit capture time
    #[must_use]
    pub fn captured_at(
        product_id: impl Into<String>,
        captured_at: DateTime<Local>,
        original_price: impl Into<String>,
        current_price: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            captured_at,
            original_price: original_price.into(),
            current_price: current_price.into(),
            source_url: source_url.into(),
        }
    }

    #[must_use]
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    #[must_use]
    pub const fn captured(&self) -> &DateTime<Local> {
        &self.captured_at
    }

    #[must_use]
    pub fn original_price(&self) -> &str {
        &self.original_price
    }

    #[must_use]
    pub fn current_price(&self) -> &str {
        &self.current_price
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Whether the current price is lower than the listed original price
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        self.original_price != self.current_price
    }

    /// Column order: id, timestamp, original price, current price, url
    #[must_use]
    pub fn to_row(&self) -> [String; 5] {
        [
            self.product_id.clone(),
            self.captured_at.format(CAPTURED_AT_FORMAT).to_string(),
            self.original_price.clone(),
            self.current_price.clone(),
            self.source_url.clone(),
        ]
    }
}
