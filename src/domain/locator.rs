//! Element locators
//!
//! A locator is an opaque CSS selector; a chain is an ordered list of
//! price-locator pairs tried in priority order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CSS selector used to find an element within a scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Selector matching any element that carries `attribute`
    #[must_use]
    pub fn with_attribute(attribute: &str) -> Self {
        Self(format!("*[{attribute}]"))
    }

    /// Selector matching the element with the given id
    #[must_use]
    pub fn id(id: &str) -> Self {
        Self(format!("#{id}"))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(selector: &str) -> Self {
        Self::css(selector)
    }
}

/// Locators for the original (pre-discount) and current price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorPair {
    pub original: Locator,
    pub current: Locator,
}

impl LocatorPair {
    #[must_use]
    pub fn new(original: impl Into<Locator>, current: impl Into<Locator>) -> Self {
        Self {
            original: original.into(),
            current: current.into(),
        }
    }
}

/// Ordered fallback list; the first pair whose locators both resolve wins
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocatorChain(Vec<LocatorPair>);

impl LocatorChain {
    #[must_use]
    pub const fn new(pairs: Vec<LocatorPair>) -> Self {
        Self(pairs)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LocatorPair> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<LocatorPair> for LocatorChain {
    fn from_iter<I: IntoIterator<Item = LocatorPair>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a LocatorChain {
    type Item = &'a LocatorPair;
    type IntoIter = std::slice::Iter<'a, LocatorPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
