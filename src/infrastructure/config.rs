//! Configuration infrastructure
//!
//! Configuration is layered with the `config` crate, lowest priority first:
//! 1. Built-in defaults (see [`defaults`])
//! 2. `config/default.{toml,json,yaml}` next to the working directory (optional)
//! 3. An explicit file passed on the command line (optional)
//! 4. `FLANCO__<SECTION>__<KEY>` environment variables
//! 5. The legacy `SELENIUM_HOST`, `SELENIUM_PORT` and `FLANCO_URL` variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::domain::{Locator, LocatorChain, LocatorPair};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed for '{field}': {message}")]
    Validation { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub webdriver: WebDriverConfig,
    pub timing: TimingConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub selectors: CatalogSelectors,
}

/// Which site is crawled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog root; relative category URLs are joined onto it
    pub base_url: String,
}

/// Remote browser hub settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub host: String,
    pub port: u16,
    /// Path of the WebDriver endpoint on the hub
    pub hub_path: String,
    /// Path polled by the readiness probe
    pub status_path: String,
    pub headless: bool,
    pub disable_images: bool,
}

impl WebDriverConfig {
    #[must_use]
    pub fn hub_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.hub_path)
    }

    #[must_use]
    pub fn status_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.status_path)
    }
}

/// Timeouts and poll intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Bound on waiting for document readiness or a locator
    pub element_wait_timeout_ms: u64,
    /// Poll interval while waiting on the page
    pub element_poll_interval_ms: u64,
    /// Bound on waiting for the browser hub to report ready
    pub readiness_timeout_ms: u64,
    /// Poll interval of the readiness probe
    pub readiness_poll_interval_ms: u64,
    /// Per-request timeout of a single readiness probe
    pub readiness_request_timeout_ms: u64,
}

impl TimingConfig {
    #[must_use]
    pub const fn element_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.element_wait_timeout_ms)
    }

    #[must_use]
    pub const fn element_poll_interval(&self) -> Duration {
        Duration::from_millis(self.element_poll_interval_ms)
    }

    #[must_use]
    pub const fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    #[must_use]
    pub const fn readiness_poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_interval_ms)
    }

    #[must_use]
    pub const fn readiness_request_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_request_timeout_ms)
    }
}

/// Where and how records are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding one CSV file per product
    pub csv_dir: PathBuf,
    /// Log a progress line every this many records
    pub progress_log_interval: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    /// Also write JSON logs to a file under `log_dir`
    pub file_output: bool,
    pub log_dir: PathBuf,
    pub log_file_name: String,
}

/// CSS selectors for the catalog's markup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSelectors {
    /// One entry of the listing grid
    pub product_entry: Locator,
    /// Attribute carrying the product id
    pub product_id_attribute: String,
    /// Price container inside a listing entry
    pub price_box: Locator,
    /// Price pairs tried in order inside the price container
    pub price_chain: LocatorChain,
    /// Anchor carrying the canonical product URL
    pub product_link: Locator,
    /// Pagination "next" control, excluding the mobile filter overlay
    pub next_page: Locator,
    /// Category anchors of the top navigation menu
    pub category_anchor: Locator,
    /// Site search input
    pub search_field: Locator,
    /// Price container on a product page
    pub product_page_price_box: Locator,
}

impl CatalogSelectors {
    /// Locator for the element holding the product id
    #[must_use]
    pub fn product_id(&self) -> Locator {
        Locator::with_attribute(&self.product_id_attribute)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: flanco::BASE_URL.to_string(),
        }
    }
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            host: defaults::WEBDRIVER_HOST.to_string(),
            port: defaults::WEBDRIVER_PORT,
            hub_path: defaults::WEBDRIVER_HUB_PATH.to_string(),
            status_path: defaults::WEBDRIVER_STATUS_PATH.to_string(),
            headless: true,
            disable_images: true,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            element_wait_timeout_ms: defaults::ELEMENT_WAIT_TIMEOUT_MS,
            element_poll_interval_ms: defaults::ELEMENT_POLL_INTERVAL_MS,
            readiness_timeout_ms: defaults::READINESS_TIMEOUT_MS,
            readiness_poll_interval_ms: defaults::READINESS_POLL_INTERVAL_MS,
            readiness_request_timeout_ms: defaults::READINESS_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from(defaults::CSV_DIR),
            progress_log_interval: defaults::PROGRESS_LOG_INTERVAL,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: PathBuf::from(defaults::LOG_DIR),
            log_file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            product_entry: Locator::css(flanco::PRODUCT_ENTRY),
            product_id_attribute: flanco::PRODUCT_ID_ATTRIBUTE.to_string(),
            price_box: Locator::css(flanco::PRICE_BOX),
            price_chain: flanco::PRICE_PAIRS
                .iter()
                .map(|(original, current)| LocatorPair::new(*original, *current))
                .collect(),
            product_link: Locator::css(flanco::PRODUCT_LINK),
            next_page: Locator::css(flanco::NEXT_PAGE),
            category_anchor: Locator::css(flanco::CATEGORY_ANCHOR),
            search_field: Locator::id(flanco::SEARCH_FIELD_ID),
            product_page_price_box: Locator::css(flanco::PRODUCT_PAGE_PRICE_BOX),
        }
    }
}

impl AppConfig {
    /// Loads the layered configuration, `extra_file` taking precedence over
    /// `config/default`
    pub fn load(extra_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::with_name("config/default").required(false));

        if let Some(path) = extra_file {
            info!("Loading configuration file {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("webdriver.host", std::env::var("SELENIUM_HOST").ok())?
            .set_override_option("webdriver.port", std::env::var("SELENIUM_PORT").ok())?
            .set_override_option("catalog.base_url", std::env::var("FLANCO_URL").ok())?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values the crawler cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.catalog.base_url)
            .map_err(|e| ConfigError::invalid("catalog.base_url", e.to_string()))?;

        for (field, value) in [
            ("timing.element_wait_timeout_ms", self.timing.element_wait_timeout_ms),
            ("timing.element_poll_interval_ms", self.timing.element_poll_interval_ms),
            ("timing.readiness_timeout_ms", self.timing.readiness_timeout_ms),
            ("timing.readiness_poll_interval_ms", self.timing.readiness_poll_interval_ms),
            ("timing.readiness_request_timeout_ms", self.timing.readiness_request_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than 0"));
            }
        }

        if self.output.progress_log_interval == 0 {
            return Err(ConfigError::invalid(
                "output.progress_log_interval",
                "must be greater than 0",
            ));
        }

        if self.selectors.price_chain.is_empty() {
            return Err(ConfigError::invalid(
                "selectors.price_chain",
                "at least one price locator pair is required",
            ));
        }

        if self.selectors.product_id_attribute.trim().is_empty() {
            return Err(ConfigError::invalid(
                "selectors.product_id_attribute",
                "must not be empty",
            ));
        }

        Ok(())
    }
}

/// Flanco catalog URLs and markup
pub mod flanco {
    /// Catalog root
    pub const BASE_URL: &str = "https://www.flanco.ro/";

    pub const PRODUCT_ENTRY: &str = "li.product-item";

    pub const PRODUCT_ID_ATTRIBUTE: &str = "data-product-sku";

    pub const PRICE_BOX: &str = "div.price-box";

    /// (original price, current price), in fallback order
    pub const PRICE_PAIRS: &[(&str, &str)] = &[
        // simple price
        (".singlePrice span.price", ".singlePrice span.price"),
        // reduced price, struck-through variant
        (
            "div.pricesPrp .pretVechiTaiat span.price",
            "div.pricesPrp .special-price span.price",
        ),
        // reduced price, PRP variant
        (
            "div.pricesPrp .pretVechi .pricePrp span.price",
            "div.pricesPrp .special-price span.price",
        ),
    ];

    pub const PRODUCT_LINK: &str = "a.product-item-link";

    /// The mobile filter overlay carries a look-alike control
    pub const NEXT_PAGE: &str = "a.action.next:not(.mobile-filter-container a)";

    pub const CATEGORY_ANCHOR: &str = "div.heromenu div.heromenu-content div.heromenu-content-category-wrapper div.heromenu-content-category-list li a";

    pub const SEARCH_FIELD_ID: &str = "searchingfield";

    pub const PRODUCT_PAGE_PRICE_BOX: &str = "div.product-info-price div.price-box";
}

/// Default configuration values
pub mod defaults {
    /// Environment variable prefix, e.g. `FLANCO__WEBDRIVER__HOST`
    pub const ENV_PREFIX: &str = "FLANCO";

    pub const WEBDRIVER_HOST: &str = "localhost";

    pub const WEBDRIVER_PORT: u16 = 4445;

    pub const WEBDRIVER_HUB_PATH: &str = "/wd/hub";

    pub const WEBDRIVER_STATUS_PATH: &str = "/wd/hub/status";

    pub const ELEMENT_WAIT_TIMEOUT_MS: u64 = 10_000;

    pub const ELEMENT_POLL_INTERVAL_MS: u64 = 500;

    pub const READINESS_TIMEOUT_MS: u64 = 10_000;

    pub const READINESS_POLL_INTERVAL_MS: u64 = 100;

    pub const READINESS_REQUEST_TIMEOUT_MS: u64 = 2_000;

    pub const CSV_DIR: &str = "./shared_dir/flanco_csv/";

    /// Records between two progress log lines
    pub const PROGRESS_LOG_INTERVAL: usize = 200;

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_FILE_OUTPUT: bool = false;

    pub const LOG_DIR: &str = "logs";

    pub const LOG_FILE_NAME: &str = "flanco-price-tracker.log";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.webdriver.hub_url(), "http://localhost:4445/wd/hub");
        assert_eq!(
            config.webdriver.status_url(),
            "http://localhost:4445/wd/hub/status"
        );
        assert_eq!(config.selectors.price_chain.len(), 3);
        assert_eq!(config.selectors.product_id().as_str(), "*[data-product-sku]");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.timing.element_wait_timeout_ms = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation { ref field, .. } if field == "timing.element_wait_timeout_ms"
        ));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let mut config = AppConfig::default();
        config.catalog.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_price_chain_rejected() {
        let mut config = AppConfig::default();
        config.selectors.price_chain = LocatorChain::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[output]\ncsv_dir = \"/tmp/prices\"\n\n[timing]\nelement_wait_timeout_ms = 2500"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.output.csv_dir, PathBuf::from("/tmp/prices"));
        assert_eq!(config.timing.element_wait_timeout_ms, 2500);
        // untouched sections keep their defaults
        assert_eq!(config.output.progress_log_interval, defaults::PROGRESS_LOG_INTERVAL);
        assert_eq!(config.selectors.next_page.as_str(), flanco::NEXT_PAGE);
    }
}
