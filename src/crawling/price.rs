//! Price text extraction
//!
//! Prices are kept as strings. The catalog writes `1.234,56 Lei`, and whether a
//! separator is decimal or thousands is left to whoever reads the CSV.

use super::error::{CrawlError, CrawlResult};
use super::resolver::SelectorResolver;
use crate::domain::LocatorChain;
use crate::infrastructure::browser::{ElementScope, PageElement};

/// Separators kept by [`normalize_price`]
const PRICE_SEPARATORS: [char; 2] = [',', '.'];

/// Keeps ASCII digits and the two separators, drops everything else
#[must_use]
pub fn normalize_price(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || PRICE_SEPARATORS.contains(c))
        .collect()
}

/// Original and current price, normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPrices {
    pub original: String,
    pub current: String,
}

/// Resolves `chain` inside a price box and reads both prices
///
/// `NotFound` when no markup variant resolves; reading the matched elements can
/// still fail with a stale reference if the page re-renders underneath us.
pub async fn extract_prices<S: ElementScope>(
    price_box: &S,
    chain: &LocatorChain,
) -> CrawlResult<ExtractedPrices> {
    let pair = SelectorResolver::resolve(price_box, chain)
        .await
        .ok_or_else(|| CrawlError::not_found("price pair", format!("{} variants", chain.len())))?;

    let original = pair.original.text().await?;
    let current = pair.current.text().await?;

    Ok(ExtractedPrices {
        original: normalize_price(&original),
        current: normalize_price(&current),
    })
}
