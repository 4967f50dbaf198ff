//! Browser session abstraction
//!
//! The crawler only talks to the remote browser through these traits. The
//! WebDriver adapter lives in `webdriver_session`; tests use the in-memory
//! fake from `test_utils`.

use crate::domain::Locator;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Script used to poll page readiness
pub const DOCUMENT_READY_SCRIPT: &str = r#"return document.readyState == "complete";"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The element reference no longer matches live page content
    #[error("Stale element reference: {context}")]
    StaleReference { context: String },

    /// The backend gave up waiting on its side
    #[error("Browser operation timed out: {context}")]
    Timeout { context: String },

    /// Navigation to a URL failed
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Any other driver/protocol failure
    #[error("Browser session error: {message}")]
    Driver { message: String },
}

impl SessionError {
    pub fn stale(context: impl Into<String>) -> Self {
        Self::StaleReference {
            context: context.into(),
        }
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleReference { .. })
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Something elements can be looked up in: the whole page or one element
#[async_trait]
pub trait ElementScope: Send + Sync {
    type Element: PageElement;

    /// First match, `None` when nothing matches
    async fn find(&self, locator: &Locator) -> SessionResult<Option<Self::Element>>;

    /// All matches in document order
    async fn find_all(&self, locator: &Locator) -> SessionResult<Vec<Self::Element>>;
}

/// Handle to a rendered element
#[async_trait]
pub trait PageElement: ElementScope<Element = Self> + Clone + Sized + 'static {
    async fn text(&self) -> SessionResult<String>;

    async fn attribute(&self, name: &str) -> SessionResult<Option<String>>;

    /// Types `text` into an input and submits it with Enter
    async fn type_and_submit(&self, text: &str) -> SessionResult<()>;
}

/// A live, exclusively owned browser session
#[async_trait]
pub trait BrowserSession: ElementScope + Sized {
    async fn navigate(&self, url: &str) -> SessionResult<()>;

    async fn current_url(&self) -> SessionResult<String>;

    async fn execute_script(&self, script: &str) -> SessionResult<Value>;

    /// Clicks through a script call so overlays cannot intercept the click
    async fn click_via_script(&self, element: &Self::Element) -> SessionResult<()>;

    /// Ends the remote session
    async fn close(self) -> SessionResult<()>;

    async fn is_document_ready(&self) -> SessionResult<bool> {
        let value = self.execute_script(DOCUMENT_READY_SCRIPT).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}
