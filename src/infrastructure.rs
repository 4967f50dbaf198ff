//! Infrastructure layer: configuration, logging, the browser seam and its
//! WebDriver adapter, backend readiness, and CSV persistence.

pub mod browser;
pub mod config;
pub mod logging;
pub mod readiness;
pub mod record_sink;
pub mod webdriver_session;

pub use browser::{BrowserSession, ElementScope, PageElement, SessionError, SessionResult};
pub use config::{AppConfig, ConfigError};
pub use logging::init_logging_with_config;
pub use readiness::{ReadinessError, ReadinessProbe};
pub use record_sink::{CsvRecordSink, RecordSink, SinkError};
pub use webdriver_session::WebDriverSession;
