//! Bounded polling
//!
//! Page readiness and element appearance are the only places the crawler
//! waits. Both poll at a fixed interval and give up after a fixed timeout.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::trace;

use super::error::{CrawlError, CrawlResult};
use crate::domain::Locator;
use crate::infrastructure::browser::{BrowserSession, ElementScope};
use crate::infrastructure::config::TimingConfig;

/// Polls `probe` until it yields a value or `timeout` elapses
///
/// The probe always runs at least once, even with a zero timeout.
pub async fn poll_for<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let started = Instant::now();
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return None;
        }
        sleep(interval.min(timeout - elapsed)).await;
    }
}

/// Polls `condition` until it holds or `timeout` elapses
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_for(timeout, interval, || {
        let check = condition();
        async move { check.await.then_some(()) }
    })
    .await
    .is_some()
}

/// Waits on page state with the configured bounds
#[derive(Debug, Clone, Copy)]
pub struct PageWaiter {
    timeout: Duration,
    interval: Duration,
}

impl PageWaiter {
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    #[must_use]
    pub const fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(timing.element_wait_timeout(), timing.element_poll_interval())
    }

    /// Waits for `document.readyState == "complete"`
    pub async fn document_ready<B: BrowserSession>(&self, browser: &B) -> CrawlResult<()> {
        let ready = poll_until(self.timeout, self.interval, || async {
            match browser.is_document_ready().await {
                Ok(ready) => ready,
                Err(e) => {
                    trace!("Readiness check failed: {}", e);
                    false
                }
            }
        })
        .await;

        if ready {
            Ok(())
        } else {
            Err(CrawlError::timeout("document ready state", self.timeout))
        }
    }

    /// Waits until `locator` matches inside `scope` and returns the first match
    pub async fn element<S: ElementScope>(
        &self,
        scope: &S,
        locator: &Locator,
    ) -> CrawlResult<S::Element> {
        poll_for(self.timeout, self.interval, || async {
            match scope.find(locator).await {
                Ok(found) => found,
                Err(e) => {
                    trace!("Lookup of {} failed while waiting: {}", locator, e);
                    None
                }
            }
        })
        .await
        .ok_or_else(|| CrawlError::timeout(format!("element {locator}"), self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_poll_for_returns_first_value() {
        let calls = Cell::new(0);
        let found = poll_for(Duration::from_secs(1), Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { (n == 3).then_some(n) }
        })
        .await;

        assert_eq!(found, Some(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_poll_until_gives_up() {
        let started = std::time::Instant::now();
        let held = poll_until(Duration::from_millis(40), Duration::from_millis(5), || async {
            false
        })
        .await;

        assert!(!held);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_zero_timeout_still_probes_once() {
        let held = poll_until(Duration::ZERO, Duration::from_millis(5), || async { true }).await;
        assert!(held);
    }

    #[tokio::test]
    async fn test_page_waiter_against_fake_browser() {
        use crate::crawling::error::ErrorKind;
        use crate::test_utils::{FakeBrowser, FakeNode};

        let waiter = PageWaiter::new(Duration::from_millis(30), Duration::from_millis(5));
        let browser = FakeBrowser::new().with_page("https://shop.test/", vec![FakeNode::new("li.item")]);
        browser.navigate("https://shop.test/").await.unwrap();

        assert!(waiter.document_ready(&browser).await.is_ok());
        assert!(waiter.element(&browser, &Locator::css("li.item")).await.is_ok());

        let missing = waiter.element(&browser, &Locator::css("li.other")).await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Timeout);

        let loading = FakeBrowser::new().never_ready();
        let err = waiter.document_ready(&loading).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
