//! # Crawl Orchestrator
//!
//! Drives one browser session through the catalog:
//!
//! - category listings page by page (`Load -> Extract -> Advance`, until no
//!   next control is left)
//! - the whole catalog, by enumerating the category menu once and walking each
//!   category with the same seen-id set and entry cap
//! - explicit product ids, looked up through the site search
//!
//! Faults are classified by [`CrawlError::recovery`] and handled at the level
//! that owns the recovery: entries are skipped inside the grid loop, pages and
//! categories are abandoned by the listing loop, and only run-level faults reach
//! the caller. The entry cap travels up as `ControlFlow::Break(RunStop)`.

use std::fmt;
use std::ops::ControlFlow;
use tracing::{Instrument, debug, error, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use super::error::{CrawlError, CrawlResult, ErrorKind, Recovery, Stage};
use super::price::extract_prices;
use super::session::CrawlSession;
use super::waiting::PageWaiter;
use crate::domain::{PriceRecord, RunMode};
use crate::infrastructure::browser::{BrowserSession, ElementScope, PageElement, SessionResult};
use crate::infrastructure::config::{AppConfig, CatalogSelectors};
use crate::infrastructure::record_sink::RecordSink;

/// Clean end of a run before the walk was complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStop {
    cause: CrawlError,
}

impl RunStop {
    #[must_use]
    pub const fn cause(&self) -> &CrawlError {
        &self.cause
    }
}

impl fmt::Display for RunStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)
    }
}

/// A fault that escaped the level it happened in
#[derive(Debug)]
pub struct StageFault {
    pub stage: Stage,
    pub error: CrawlError,
}

impl StageFault {
    const fn new(stage: Stage, error: CrawlError) -> Self {
        Self { stage, error }
    }

    #[must_use]
    pub const fn recovery(&self) -> Recovery {
        self.error.recovery(self.stage)
    }
}

type Flow<T = ()> = Result<ControlFlow<RunStop, T>, StageFault>;

/// Counters for one category walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySummary {
    pub url: String,
    pub pages_visited: usize,
    pub records_written: usize,
    /// Entries skipped because their id was already recorded this run
    pub duplicates_skipped: usize,
    pub entries_failed: usize,
}

/// What a run did, logged when it ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub mode: String,
    pub categories_visited: usize,
    pub pages_visited: usize,
    pub records_written: usize,
    pub duplicates_skipped: usize,
    pub entries_failed: usize,
    pub stopped: Option<RunStop>,
}

impl RunSummary {
    fn absorb(&mut self, category: &CategorySummary) {
        self.categories_visited += 1;
        self.pages_visited += category.pages_visited;
        self.duplicates_skipped += category.duplicates_skipped;
        self.entries_failed += category.entries_failed;
    }
}

/// Steps of a listing walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingState {
    /// Wait for the grid, navigating first on the category's first page
    Load { navigate: bool },
    Extract,
    Advance,
    Done,
}

/// Catalog location, markup and wait bounds for a run
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    base_url: Url,
    selectors: CatalogSelectors,
    waiter: PageWaiter,
}

impl CrawlSettings {
    pub fn from_config(config: &AppConfig) -> CrawlResult<Self> {
        let base_url = Url::parse(&config.catalog.base_url).map_err(|e| {
            CrawlError::other(format!(
                "Invalid catalog URL {}: {}",
                config.catalog.base_url, e
            ))
        })?;

        Ok(Self {
            base_url,
            selectors: config.selectors.clone(),
            waiter: PageWaiter::from_timing(&config.timing),
        })
    }
}

pub struct CrawlOrchestrator<B: BrowserSession, S: RecordSink> {
    browser: B,
    sink: S,
    session: CrawlSession,
    selectors: CatalogSelectors,
    base_url: Url,
    waiter: PageWaiter,
    summary: RunSummary,
}

impl<B: BrowserSession, S: RecordSink> CrawlOrchestrator<B, S> {
    #[must_use]
    pub fn new(browser: B, sink: S, session: CrawlSession, settings: CrawlSettings) -> Self {
        let summary = RunSummary {
            run_id: session.run_id(),
            ..RunSummary::default()
        };

        Self {
            browser,
            sink,
            session,
            selectors: settings.selectors,
            base_url: settings.base_url,
            waiter: settings.waiter,
            summary,
        }
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub const fn session(&self) -> &CrawlSession {
        &self.session
    }

    /// Closes the browser session and hands back the sink
    ///
    /// Must be called whatever [`run`](Self::run) returned.
    pub async fn shutdown(self) -> (S, SessionResult<()>) {
        let closed = self.browser.close().await;
        if let Err(e) = &closed {
            warn!("Browser session did not close cleanly: {}", e);
        }
        (self.sink, closed)
    }

    /// Runs one mode to completion
    ///
    /// Reaching the entry cap is a normal end and shows up as
    /// [`RunSummary::stopped`]; only run-level faults are returned as errors.
    pub async fn run(&mut self, mode: &RunMode) -> CrawlResult<RunSummary> {
        let span = info_span!("crawl_run", run_id = %self.session.run_id(), mode = %mode);
        self.run_mode(mode).instrument(span).await
    }

    async fn run_mode(&mut self, mode: &RunMode) -> CrawlResult<RunSummary> {
        info!(
            "Starting {} run, writing to {} (max entries: {:?})",
            mode,
            self.session.sink_directory().display(),
            self.session.max_entries()
        );
        self.summary.mode = mode.to_string();

        let flow = match mode {
            RunMode::Category { url } => match self.category_url(url) {
                Ok(url) => self
                    .crawl_category(&url)
                    .await
                    .map(|flow| match flow {
                        ControlFlow::Break(stop) => ControlFlow::Break(stop),
                        ControlFlow::Continue(_) => ControlFlow::Continue(()),
                    }),
                Err(e) => Err(StageFault::new(Stage::Startup, e)),
            },
            RunMode::Entire => self.crawl_catalog().await,
            RunMode::Test | RunMode::List { .. } => {
                let product_ids = mode.product_ids().unwrap_or_default();
                self.crawl_products(&product_ids).await
            }
        };

        self.summary.records_written = self.session.records_written();
        match flow {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(stop)) => {
                info!("Stopping because: {}", stop);
                self.summary.stopped = Some(stop);
            }
            Err(fault) => {
                error!(
                    "Run aborted at {} ({:?}): {}",
                    fault.stage,
                    fault.recovery(),
                    fault.error
                );
                return Err(fault.error);
            }
        }

        Ok(self.summary.clone())
    }

    /// Every category in the catalog menu, sharing one session
    ///
    /// The menu is read once; the captured list is used for the whole run.
    pub async fn crawl_catalog(&mut self) -> Flow {
        let categories = self
            .enumerate_categories()
            .await
            .map_err(|e| StageFault::new(Stage::Startup, e))?;

        for url in &categories {
            if let ControlFlow::Break(stop) = self.crawl_category(url).await? {
                return Ok(ControlFlow::Break(stop));
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    async fn enumerate_categories(&self) -> CrawlResult<Vec<String>> {
        self.open_catalog_root().await?;
        self.waiter
            .element(&self.browser, &self.selectors.category_anchor)
            .await?;

        let anchors = self.browser.find_all(&self.selectors.category_anchor).await?;
        let mut urls = Vec::with_capacity(anchors.len());
        for anchor in &anchors {
            match anchor.attribute("href").await {
                Ok(Some(href)) => match self.category_url(&href) {
                    Ok(url) => urls.push(url),
                    Err(e) => warn!("Skipping category anchor: {}", e),
                },
                Ok(None) => warn!("Skipping category anchor without href"),
                Err(e) => warn!("Skipping unreadable category anchor: {}", e),
            }
        }

        info!("Found {} categories", urls.len());
        Ok(urls)
    }

    /// One category listing, following next-page controls until none is left
    pub async fn crawl_category(&mut self, url: &str) -> Flow<CategorySummary> {
        info!("Scraping category at {}", url);
        let mut category = CategorySummary {
            url: url.to_string(),
            ..CategorySummary::default()
        };

        let flow = self.walk_listing(url, &mut category).await;
        self.summary.absorb(&category);
        info!(
            "Category done: {} pages, {} records, skipped {} known products, {} failed entries",
            category.pages_visited,
            category.records_written,
            category.duplicates_skipped,
            category.entries_failed
        );

        match flow? {
            ControlFlow::Break(stop) => Ok(ControlFlow::Break(stop)),
            ControlFlow::Continue(()) => Ok(ControlFlow::Continue(category)),
        }
    }

    async fn walk_listing(&mut self, url: &str, category: &mut CategorySummary) -> Flow {
        let mut state = ListingState::Load { navigate: true };

        loop {
            state = match state {
                ListingState::Load { navigate } => {
                    match self.load_listing(navigate.then_some(url)).await {
                        Ok(()) => {
                            category.pages_visited += 1;
                            ListingState::Extract
                        }
                        Err(e) => {
                            if let Some(flow) = abandon_category(Stage::PageLoad, e)? {
                                return Ok(flow);
                            }
                            ListingState::Done
                        }
                    }
                }
                ListingState::Extract => match self.extract_grid(category).await? {
                    ControlFlow::Break(stop) => return Ok(ControlFlow::Break(stop)),
                    ControlFlow::Continue(()) => ListingState::Advance,
                },
                ListingState::Advance => match self.advance_page().await {
                    Ok(true) => ListingState::Load { navigate: false },
                    Ok(false) => {
                        debug!("No next page after page {}", category.pages_visited);
                        ListingState::Done
                    }
                    Err(e) => {
                        if let Some(flow) = abandon_category(Stage::NextControl, e)? {
                            return Ok(flow);
                        }
                        ListingState::Done
                    }
                },
                ListingState::Done => return Ok(ControlFlow::Continue(())),
            };
        }
    }

    async fn load_listing(&self, url: Option<&str>) -> CrawlResult<()> {
        if let Some(url) = url {
            self.browser.navigate(url).await?;
        }
        self.waiter.document_ready(&self.browser).await?;
        self.waiter
            .element(&self.browser, &self.selectors.product_entry)
            .await?;
        Ok(())
    }

    /// Processes every entry currently rendered in the grid
    async fn extract_grid(&mut self, category: &mut CategorySummary) -> Flow {
        let entries = match self.browser.find_all(&self.selectors.product_entry).await {
            Ok(entries) => entries,
            Err(e) => {
                let error = CrawlError::from(e);
                return match error.recovery(Stage::Grid) {
                    Recovery::AbandonPage => {
                        warn!("Could not enumerate products on page {}: {}", category.pages_visited, error);
                        Ok(ControlFlow::Continue(()))
                    }
                    Recovery::StopRun => Ok(ControlFlow::Break(RunStop { cause: error })),
                    _ => Err(StageFault::new(Stage::Grid, error)),
                };
            }
        };
        debug!(
            "Found {} products on page {}",
            entries.len(),
            category.pages_visited
        );

        for entry in &entries {
            let product_id = match self.read_product_id(entry).await {
                Ok(id) => id,
                Err(e) => {
                    if let ControlFlow::Break(stop) = skip_entry(None, e)? {
                        return Ok(ControlFlow::Break(stop));
                    }
                    category.entries_failed += 1;
                    continue;
                }
            };

            if self.session.has_seen(&product_id) {
                category.duplicates_skipped += 1;
                continue;
            }

            match self.record_entry(entry, &product_id).await {
                Ok(()) => category.records_written += 1,
                Err(e) => {
                    if let ControlFlow::Break(stop) = skip_entry(Some(&product_id), e)? {
                        return Ok(ControlFlow::Break(stop));
                    }
                    category.entries_failed += 1;
                }
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    async fn read_product_id(&self, entry: &B::Element) -> CrawlResult<String> {
        let locator = self.selectors.product_id();
        let holder = entry
            .find(&locator)
            .await?
            .ok_or_else(|| CrawlError::not_found("product id", &locator))?;

        holder
            .attribute(&self.selectors.product_id_attribute)
            .await?
            .ok_or_else(|| CrawlError::not_found("product id attribute", &locator))
    }

    async fn record_entry(&mut self, entry: &B::Element, product_id: &str) -> CrawlResult<()> {
        let price_box = entry
            .find(&self.selectors.price_box)
            .await?
            .ok_or_else(|| CrawlError::not_found("price box", &self.selectors.price_box))?;
        let prices = extract_prices(&price_box, &self.selectors.price_chain).await?;

        let href = entry
            .find(&self.selectors.product_link)
            .await?
            .ok_or_else(|| CrawlError::not_found("product link", &self.selectors.product_link))?
            .attribute("href")
            .await?
            .ok_or_else(|| CrawlError::not_found("product link href", &self.selectors.product_link))?;
        let source_url = self
            .base_url
            .join(&href)
            .map_or(href, |url| url.to_string());

        let record = PriceRecord::capture(product_id, prices.original, prices.current, source_url);
        self.session.persist(&mut self.sink, &record)
    }

    /// `Ok(true)` when a next control was found and activated
    async fn advance_page(&self) -> CrawlResult<bool> {
        let Some(next) = self.browser.find(&self.selectors.next_page).await? else {
            return Ok(false);
        };
        self.browser.click_via_script(&next).await?;
        Ok(true)
    }

    /// Product ids looked up one by one through the site search
    pub async fn crawl_products(&mut self, product_ids: &[String]) -> Flow {
        self.open_catalog_root()
            .await
            .map_err(|e| StageFault::new(Stage::Startup, e))?;

        for product_id in product_ids {
            if self.session.has_seen(product_id) {
                self.summary.duplicates_skipped += 1;
                continue;
            }

            match self.record_product(product_id).await {
                Ok(()) => debug!("Recorded product {}", product_id),
                Err(e) => {
                    if let ControlFlow::Break(stop) = skip_entry(Some(product_id), e)? {
                        return Ok(ControlFlow::Break(stop));
                    }
                    self.summary.entries_failed += 1;
                }
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    async fn record_product(&mut self, product_id: &str) -> CrawlResult<()> {
        let search_field = self
            .waiter
            .element(&self.browser, &self.selectors.search_field)
            .await?;
        search_field.type_and_submit(product_id).await?;

        self.waiter.document_ready(&self.browser).await?;
        let price_box = self
            .waiter
            .element(&self.browser, &self.selectors.product_page_price_box)
            .await?;
        let prices = extract_prices(&price_box, &self.selectors.price_chain).await?;
        let source_url = self.browser.current_url().await?;

        let record = PriceRecord::capture(product_id, prices.original, prices.current, source_url);
        self.session.persist(&mut self.sink, &record)
    }

    async fn open_catalog_root(&self) -> CrawlResult<()> {
        info!("Opening catalog at {}", self.base_url);
        self.browser.navigate(self.base_url.as_str()).await?;
        self.waiter.document_ready(&self.browser).await
    }

    /// Absolute category URL; relative paths are joined onto the catalog root
    fn category_url(&self, url: &str) -> CrawlResult<String> {
        self.base_url
            .join(url)
            .map(String::from)
            .map_err(|e| CrawlError::other(format!("Invalid category URL {url}: {e}")))
    }
}

/// Handles a listing-level fault; `None` means the category is abandoned
fn abandon_category(stage: Stage, error: CrawlError) -> Result<Option<ControlFlow<RunStop>>, StageFault> {
    match error.recovery(stage) {
        Recovery::AbandonCategory => {
            match (error.kind(), stage) {
                (ErrorKind::Stale, _) => {
                    info!("Stale element at {}, going to the next category", stage);
                }
                (ErrorKind::Timeout, Stage::PageLoad) => {
                    warn!("Couldn't find any products on page ({}), moving to next category", error);
                }
                _ => warn!("Abandoning category at {}: {}", stage, error),
            }
            Ok(None)
        }
        Recovery::StopRun => Ok(Some(ControlFlow::Break(RunStop { cause: error }))),
        _ => Err(StageFault::new(stage, error)),
    }
}

/// Handles a per-entry fault: logs it and lets the loop move on
fn skip_entry(product_id: Option<&str>, error: CrawlError) -> Flow {
    let id = product_id.unwrap_or("N/A");
    match error.recovery(Stage::Entry) {
        Recovery::SkipItem => {
            match (error.kind(), product_id) {
                (ErrorKind::Stale, _) => warn!("Skipping stale element: product id is {}", id),
                (ErrorKind::NotFound, Some(_)) => warn!("Skipping product {}: {}", id, error),
                // every grid entry is expected to carry an id
                (ErrorKind::NotFound, None) => error!("Product entry without id: {}", error),
                _ => error!("Got fault for product {}: {}", id, error),
            }
            Ok(ControlFlow::Continue(()))
        }
        Recovery::StopRun => Ok(ControlFlow::Break(RunStop { cause: error })),
        _ => Err(StageFault::new(Stage::Entry, error)),
    }
}
