//! WebDriver-backed browser session
//!
//! Connects to a remote Selenium hub with headless Chrome and maps
//! `thirtyfour` errors onto [`SessionError`].

use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::error::WebDriverError;
use thirtyfour::fantoccini::error::CmdError;
use thirtyfour::prelude::*;
use tracing::{debug, info};

use super::browser::{BrowserSession, ElementScope, PageElement, SessionError, SessionResult};
use super::config::WebDriverConfig;
use crate::domain::Locator;

/// WebDriver key code for the Enter key
const ENTER_KEY: &str = "\u{E007}";

const CLICK_SCRIPT: &str = "arguments[0].click();";

pub struct WebDriverSession {
    driver: WebDriver,
}

impl WebDriverSession {
    /// Opens a new Chrome session on the configured hub
    pub async fn connect(config: &WebDriverConfig) -> SessionResult<Self> {
        let hub_url = config.hub_url();
        info!("Connecting to browser hub at {}", hub_url);

        let mut caps = DesiredCapabilities::chrome();
        caps.set_no_sandbox().map_err(|e| classify(e, "capabilities"))?;
        caps.set_disable_dev_shm_usage()
            .map_err(|e| classify(e, "capabilities"))?;
        if config.headless {
            caps.set_headless().map_err(|e| classify(e, "capabilities"))?;
        }
        if config.disable_images {
            caps.add_chrome_arg("--blink-settings=imagesEnabled=false")
                .map_err(|e| classify(e, "capabilities"))?;
        }

        let driver = WebDriver::new(&hub_url, caps)
            .await
            .map_err(|e| classify(e, "session creation"))?;

        info!("Browser session established on {}", config.host);
        Ok(Self { driver })
    }
}

/// W3C error code sent back for a detached element handle
const STALE_ELEMENT_CODE: &str = "stale element reference";

/// Maps a driver error onto the session taxonomy
fn classify(error: WebDriverError, context: &str) -> SessionError {
    match error {
        WebDriverError::CmdError(CmdError::Standard(ref e)) if e.error() == STALE_ELEMENT_CODE => {
            SessionError::stale(context)
        }
        WebDriverError::Timeout(..) => SessionError::Timeout {
            context: context.to_string(),
        },
        other => SessionError::driver(format!("{context}: {other}")),
    }
}

fn optional(result: WebDriverResult<WebElement>, locator: &Locator) -> SessionResult<Option<WebElement>> {
    match result {
        Ok(element) => Ok(Some(element)),
        Err(WebDriverError::NoSuchElement(..)) => Ok(None),
        Err(e) => Err(classify(e, locator.as_str())),
    }
}

#[async_trait]
impl ElementScope for WebDriverSession {
    type Element = WebElement;

    async fn find(&self, locator: &Locator) -> SessionResult<Option<WebElement>> {
        optional(self.driver.find(By::Css(locator.as_str())).await, locator)
    }

    async fn find_all(&self, locator: &Locator) -> SessionResult<Vec<WebElement>> {
        self.driver
            .find_all(By::Css(locator.as_str()))
            .await
            .map_err(|e| classify(e, locator.as_str()))
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> SessionResult<()> {
        debug!("Navigating to {}", url);
        self.driver
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn current_url(&self) -> SessionResult<String> {
        self.driver
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|e| classify(e, "current url"))
    }

    async fn execute_script(&self, script: &str) -> SessionResult<Value> {
        let ret = self
            .driver
            .execute(script, Vec::new())
            .await
            .map_err(|e| classify(e, "execute script"))?;
        Ok(ret.json().clone())
    }

    async fn click_via_script(&self, element: &WebElement) -> SessionResult<()> {
        let arg = element.to_json().map_err(|e| classify(e, "click target"))?;
        self.driver
            .execute(CLICK_SCRIPT, vec![arg])
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "click"))
    }

    async fn close(self) -> SessionResult<()> {
        info!("Closing browser session");
        self.driver
            .quit()
            .await
            .map_err(|e| classify(e, "session quit"))
    }
}

#[async_trait]
impl ElementScope for WebElement {
    type Element = Self;

    async fn find(&self, locator: &Locator) -> SessionResult<Option<Self>> {
        optional(WebElement::find(self, By::Css(locator.as_str())).await, locator)
    }

    async fn find_all(&self, locator: &Locator) -> SessionResult<Vec<Self>> {
        WebElement::find_all(self, By::Css(locator.as_str()))
            .await
            .map_err(|e| classify(e, locator.as_str()))
    }
}

#[async_trait]
impl PageElement for WebElement {
    async fn text(&self) -> SessionResult<String> {
        WebElement::text(self)
            .await
            .map_err(|e| classify(e, "element text"))
    }

    async fn attribute(&self, name: &str) -> SessionResult<Option<String>> {
        self.attr(name)
            .await
            .map_err(|e| classify(e, &format!("attribute {name}")))
    }

    async fn type_and_submit(&self, text: &str) -> SessionResult<()> {
        self.send_keys(format!("{text}{ENTER_KEY}"))
            .await
            .map_err(|e| classify(e, "type and submit"))
    }
}
