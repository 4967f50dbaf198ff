//! What a single invocation should crawl

use serde::{Deserialize, Serialize};
use std::fmt;

/// Product ids scraped by the `test` run mode
pub const TEST_PRODUCT_IDS: &[&str] = &[
    "147719", // Trotineta electrica Blaupunkt
    "143800", // Combina frigorifica Arctic
    "144043", // Combina frigorifica Beko
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunMode {
    /// The built-in product ids
    Test,
    /// Explicit product ids, looked up through the site search
    List { product_ids: Vec<String> },
    /// One category listing, absolute or relative to the catalog root
    Category { url: String },
    /// Every category linked from the catalog menu
    Entire,
}

impl RunMode {
    /// Product ids to look up for the search-driven modes
    #[must_use]
    pub fn product_ids(&self) -> Option<Vec<String>> {
        match self {
            Self::Test => Some(TEST_PRODUCT_IDS.iter().map(ToString::to_string).collect()),
            Self::List { product_ids } => Some(product_ids.clone()),
            Self::Category { .. } | Self::Entire => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::List { product_ids } => write!(f, "list ({} ids)", product_ids.len()),
            Self::Category { url } => write!(f, "category {url}"),
            Self::Entire => write!(f, "entire catalog"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_uses_builtin_ids() {
        let ids = RunMode::Test.product_ids().unwrap();
        assert_eq!(ids, vec!["147719", "143800", "144043"]);
        assert!(RunMode::Entire.product_ids().is_none());
    }
}
