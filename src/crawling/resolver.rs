//! Fallback locator resolution
//!
//! A [`LocatorChain`] lists price markup variants in priority order. The first
//! pair whose locators both match inside the scope wins; a pair that matches
//! only partially is never used. A lookup that fails outright ends the
//! resolution, so a lower-priority variant never stands in for a broken one.

use tracing::{debug, warn};

use crate::domain::{Locator, LocatorChain};
use crate::infrastructure::browser::ElementScope;

/// The pair of price elements found for one chain entry
#[derive(Debug, Clone)]
pub struct ResolvedPair<E> {
    /// Position of the winning pair in the chain
    pub index: usize,
    pub original: E,
    pub current: E,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SelectorResolver;

/// Outcome of one locator lookup
enum Lookup<E> {
    Found(E),
    Missing,
    Faulted,
}

impl SelectorResolver {
    /// First fully matching pair of `chain` inside `scope`
    ///
    /// Missing elements move on to the next pair. Any other lookup fault is
    /// logged and ends the resolution with `None`.
    pub async fn resolve<S: ElementScope>(
        scope: &S,
        chain: &LocatorChain,
    ) -> Option<ResolvedPair<S::Element>> {
        for (index, pair) in chain.iter().enumerate() {
            let original = match lookup(scope, &pair.original, index).await {
                Lookup::Found(element) => element,
                Lookup::Missing => continue,
                Lookup::Faulted => return None,
            };
            let current = match lookup(scope, &pair.current, index).await {
                Lookup::Found(element) => element,
                Lookup::Missing => continue,
                Lookup::Faulted => return None,
            };

            debug!("Price markup variant {} matched", index);
            return Some(ResolvedPair {
                index,
                original,
                current,
            });
        }

        None
    }
}

async fn lookup<S: ElementScope>(scope: &S, locator: &Locator, index: usize) -> Lookup<S::Element> {
    match scope.find(locator).await {
        Ok(Some(element)) => Lookup::Found(element),
        Ok(None) => Lookup::Missing,
        Err(e) => {
            warn!("Lookup of {} in price variant {} failed: {}", locator, index, e);
            Lookup::Faulted
        }
    }
}
