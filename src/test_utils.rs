//! Test utilities
//!
//! An in-memory browser with scripted pages and fault injection, an in-memory
//! record sink, and builders for the catalog's markup. Tests drive the real
//! orchestrator against these instead of a live WebDriver hub.
//!
//! Elements are matched by their exact locator string, searched depth-first in
//! document order. A node marked faulty fails every operation on it, and a
//! first-match lookup that lands on it fails too; `find_all` still returns it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{Locator, PriceRecord};
use crate::infrastructure::browser::{
    BrowserSession, DOCUMENT_READY_SCRIPT, ElementScope, PageElement, SessionError, SessionResult,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::record_sink::{RecordSink, SinkError};

/// Injected failure for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The reference went stale
    Stale,
    /// Any other driver failure
    Broken,
}

impl Fault {
    fn error(self, locator: &str) -> SessionError {
        match self {
            Self::Stale => SessionError::stale(locator),
            Self::Broken => SessionError::driver(format!("injected failure on {locator}")),
        }
    }
}

/// One element of a scripted page
#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    locator: String,
    text: String,
    attributes: HashMap<String, String>,
    children: Vec<FakeNode>,
    fault: Option<Fault>,
    read_fault: Option<Fault>,
    link: Option<String>,
}

impl FakeNode {
    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Page opened when the node is clicked
    #[must_use]
    pub fn navigates_to(mut self, url: impl Into<String>) -> Self {
        self.link = Some(url.into());
        self
    }

    #[must_use]
    pub fn stale(mut self) -> Self {
        self.fault = Some(Fault::Stale);
        self
    }

    #[must_use]
    pub fn broken(mut self) -> Self {
        self.fault = Some(Fault::Broken);
        self
    }

    /// Found normally, but reading its text or attributes reports a stale
    /// reference, as when the page re-renders between lookup and read
    #[must_use]
    pub fn stale_on_read(mut self) -> Self {
        self.read_fault = Some(Fault::Stale);
        self
    }

    fn check(&self) -> SessionResult<()> {
        self.fault.map_or(Ok(()), |fault| Err(fault.error(&self.locator)))
    }

    fn check_read(&self) -> SessionResult<()> {
        self.check()?;
        self.read_fault.map_or(Ok(()), |fault| Err(fault.error(&self.locator)))
    }
}

/// Depth-first search of `nodes` and their descendants
fn collect_matches(nodes: &[FakeNode], locator: &str, found: &mut Vec<FakeNode>) {
    for node in nodes {
        if node.locator == locator {
            found.push(node.clone());
        }
        collect_matches(&node.children, locator, found);
    }
}

fn first_match(nodes: &[FakeNode], locator: &str) -> SessionResult<Option<FakeNode>> {
    let mut found = Vec::new();
    collect_matches(nodes, locator, &mut found);
    match found.into_iter().next() {
        Some(node) => node.check().map(|()| Some(node)),
        None => Ok(None),
    }
}

#[derive(Debug, Default)]
struct FakeDom {
    pages: HashMap<String, Vec<FakeNode>>,
    search_results: HashMap<String, String>,
    unreachable: HashSet<String>,
    current_url: String,
    navigations: Vec<String>,
    never_ready: bool,
    closed: bool,
}

impl FakeDom {
    fn navigate(&mut self, url: &str) -> SessionResult<()> {
        if self.unreachable.contains(url) {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "unreachable".to_string(),
            });
        }
        self.current_url = url.to_string();
        self.navigations.push(url.to_string());
        Ok(())
    }

    fn current_page(&self) -> &[FakeNode] {
        self.pages
            .get(&self.current_url)
            .map_or(&[][..], Vec::as_slice)
    }
}

type SharedDom = Arc<Mutex<FakeDom>>;

fn lock(dom: &SharedDom) -> MutexGuard<'_, FakeDom> {
    dom.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted browser session; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct FakeBrowser {
    dom: SharedDom,
}

impl FakeBrowser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(self, url: impl Into<String>, nodes: Vec<FakeNode>) -> Self {
        lock(&self.dom).pages.insert(url.into(), nodes);
        self
    }

    /// Page the site search lands on for `query`
    #[must_use]
    pub fn with_search_result(self, query: impl Into<String>, url: impl Into<String>) -> Self {
        lock(&self.dom).search_results.insert(query.into(), url.into());
        self
    }

    #[must_use]
    pub fn with_unreachable(self, url: impl Into<String>) -> Self {
        lock(&self.dom).unreachable.insert(url.into());
        self
    }

    /// `document.readyState` never reaches "complete"
    #[must_use]
    pub fn never_ready(self) -> Self {
        lock(&self.dom).never_ready = true;
        self
    }

    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.dom).navigations.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.dom).closed
    }
}

#[async_trait]
impl ElementScope for FakeBrowser {
    type Element = FakeElement;

    async fn find(&self, locator: &Locator) -> SessionResult<Option<FakeElement>> {
        let dom = lock(&self.dom);
        let node = first_match(dom.current_page(), locator.as_str())?;
        Ok(node.map(|node| FakeElement::new(&self.dom, node)))
    }

    async fn find_all(&self, locator: &Locator) -> SessionResult<Vec<FakeElement>> {
        let dom = lock(&self.dom);
        let mut found = Vec::new();
        collect_matches(dom.current_page(), locator.as_str(), &mut found);
        Ok(found
            .into_iter()
            .map(|node| FakeElement::new(&self.dom, node))
            .collect())
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&self, url: &str) -> SessionResult<()> {
        lock(&self.dom).navigate(url)
    }

    async fn current_url(&self) -> SessionResult<String> {
        Ok(lock(&self.dom).current_url.clone())
    }

    async fn execute_script(&self, script: &str) -> SessionResult<Value> {
        if script == DOCUMENT_READY_SCRIPT {
            return Ok(Value::Bool(!lock(&self.dom).never_ready));
        }
        Ok(Value::Null)
    }

    async fn click_via_script(&self, element: &FakeElement) -> SessionResult<()> {
        element.node.check()?;
        match &element.node.link {
            Some(url) => lock(&self.dom).navigate(url),
            None => Ok(()),
        }
    }

    async fn close(self) -> SessionResult<()> {
        lock(&self.dom).closed = true;
        Ok(())
    }
}

/// Handle to a node of the page that was current when it was found
#[derive(Debug, Clone)]
pub struct FakeElement {
    dom: SharedDom,
    node: FakeNode,
}

impl FakeElement {
    fn new(dom: &SharedDom, node: FakeNode) -> Self {
        Self {
            dom: Arc::clone(dom),
            node,
        }
    }
}

#[async_trait]
impl ElementScope for FakeElement {
    type Element = Self;

    async fn find(&self, locator: &Locator) -> SessionResult<Option<Self>> {
        self.node.check()?;
        let node = first_match(&self.node.children, locator.as_str())?;
        Ok(node.map(|node| Self::new(&self.dom, node)))
    }

    async fn find_all(&self, locator: &Locator) -> SessionResult<Vec<Self>> {
        self.node.check()?;
        let mut found = Vec::new();
        collect_matches(&self.node.children, locator.as_str(), &mut found);
        Ok(found
            .into_iter()
            .map(|node| Self::new(&self.dom, node))
            .collect())
    }
}

#[async_trait]
impl PageElement for FakeElement {
    async fn text(&self) -> SessionResult<String> {
        self.node.check_read()?;
        Ok(self.node.text.clone())
    }

    async fn attribute(&self, name: &str) -> SessionResult<Option<String>> {
        self.node.check_read()?;
        Ok(self.node.attributes.get(name).cloned())
    }

    async fn type_and_submit(&self, text: &str) -> SessionResult<()> {
        self.node.check()?;
        let mut dom = lock(&self.dom);
        let target = dom
            .search_results
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("{}catalogsearch/result/?q={text}", catalog::ROOT));
        dom.navigate(&target)
    }
}

/// Sink keeping records in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Vec<PriceRecord>,
    failing: HashSet<String>,
}

impl MemorySink {
    /// Sink whose writes fail for the given product ids
    pub fn failing_for<'a>(product_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            records: Vec::new(),
            failing: product_ids.into_iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    #[must_use]
    pub fn product_ids(&self) -> Vec<&str> {
        self.records.iter().map(PriceRecord::product_id).collect()
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &PriceRecord) -> Result<(), SinkError> {
        if self.failing.contains(record.product_id()) {
            return Err(SinkError::Open {
                path: self.location().join(format!("product{}.csv", record.product_id())),
                source: std::io::Error::other("injected write failure"),
            });
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn location(&self) -> std::path::PathBuf {
        std::path::PathBuf::from("memory")
    }
}

/// Configuration with short waits, pointing at [`catalog::ROOT`]
#[must_use]
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.catalog.base_url = catalog::ROOT.to_string();
    config.timing.element_wait_timeout_ms = 50;
    config.timing.element_poll_interval_ms = 5;
    config
}

/// Builders for the catalog's markup, using the default selectors
pub mod catalog {
    use super::FakeNode;
    use crate::infrastructure::config::flanco;

    pub const ROOT: &str = "https://www.flanco.ro/";

    #[must_use]
    pub fn product_url(product_id: &str) -> String {
        format!("{ROOT}product-{product_id}.html")
    }

    /// Price container; equal prices use the simple markup, different ones
    /// the struck-through variant
    #[must_use]
    pub fn price_box(locator: &str, original: &str, current: &str) -> FakeNode {
        let simple = flanco::PRICE_PAIRS[0];
        let struck = flanco::PRICE_PAIRS[1];
        if original == current {
            FakeNode::new(locator).child(FakeNode::new(simple.0).text(format!("{current} lei")))
        } else {
            FakeNode::new(locator)
                .child(FakeNode::new(struck.0).text(format!("{original} lei")))
                .child(FakeNode::new(struck.1).text(format!("{current} lei")))
        }
    }

    /// Price container using the PRP variant, the last one in the chain
    #[must_use]
    pub fn prp_price_box(locator: &str, original: &str, current: &str) -> FakeNode {
        let prp = flanco::PRICE_PAIRS[2];
        FakeNode::new(locator)
            .child(FakeNode::new(prp.0).text(format!("{original} lei")))
            .child(FakeNode::new(prp.1).text(format!("{current} lei")))
    }

    fn id_holder(product_id: &str) -> FakeNode {
        FakeNode::new(format!("*[{}]", flanco::PRODUCT_ID_ATTRIBUTE))
            .attr(flanco::PRODUCT_ID_ATTRIBUTE, product_id)
    }

    fn link(product_id: &str) -> FakeNode {
        FakeNode::new(flanco::PRODUCT_LINK).attr("href", product_url(product_id))
    }

    /// Listing entry with id, prices and product link
    #[must_use]
    pub fn product_entry(product_id: &str, original: &str, current: &str) -> FakeNode {
        FakeNode::new(flanco::PRODUCT_ENTRY)
            .child(id_holder(product_id))
            .child(price_box(flanco::PRICE_BOX, original, current))
            .child(link(product_id))
    }

    /// Listing entry whose id reads fine but whose price text goes stale
    #[must_use]
    pub fn stale_price_entry(product_id: &str) -> FakeNode {
        let simple = flanco::PRICE_PAIRS[0];
        FakeNode::new(flanco::PRODUCT_ENTRY)
            .child(id_holder(product_id))
            .child(
                FakeNode::new(flanco::PRICE_BOX)
                    .child(FakeNode::new(simple.0).text("1 lei").stale_on_read()),
            )
            .child(link(product_id))
    }

    /// Listing entry whose price box matches no markup variant
    #[must_use]
    pub fn unpriced_entry(product_id: &str) -> FakeNode {
        FakeNode::new(flanco::PRODUCT_ENTRY)
            .child(id_holder(product_id))
            .child(FakeNode::new(flanco::PRICE_BOX).child(FakeNode::new("span.price-unavailable")))
            .child(link(product_id))
    }

    /// Grid entries plus an optional next control leading to `next`
    #[must_use]
    pub fn listing_page(entries: Vec<FakeNode>, next: Option<&str>) -> Vec<FakeNode> {
        let mut nodes = entries;
        if let Some(url) = next {
            nodes.push(next_control(url));
        }
        nodes
    }

    #[must_use]
    pub fn next_control(url: &str) -> FakeNode {
        FakeNode::new(flanco::NEXT_PAGE).navigates_to(url)
    }

    #[must_use]
    pub fn search_field() -> FakeNode {
        FakeNode::new(format!("#{}", flanco::SEARCH_FIELD_ID))
    }

    /// Catalog root with the search field and the category menu
    #[must_use]
    pub fn menu_page(category_urls: &[&str]) -> Vec<FakeNode> {
        let mut nodes = vec![search_field()];
        nodes.extend(
            category_urls
                .iter()
                .map(|url| FakeNode::new(flanco::CATEGORY_ANCHOR).attr("href", *url)),
        );
        nodes
    }

    /// Product page reached through the search
    #[must_use]
    pub fn product_page(original: &str, current: &str) -> Vec<FakeNode> {
        vec![
            search_field(),
            price_box(flanco::PRODUCT_PAGE_PRICE_BOX, original, current),
        ]
    }
}
