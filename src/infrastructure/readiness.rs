//! Browser hub readiness probe
//!
//! Polls the hub's status endpoint until it reports `value.ready == true`.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::config::{TimingConfig, WebDriverConfig};
use crate::crawling::waiting::poll_until;

#[derive(Error, Debug)]
pub enum ReadinessError {
    #[error("Browser hub at {url} was not ready after {waited:?}")]
    TimedOut { url: String, waited: Duration },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    value: StatusValue,
}

#[derive(Debug, Deserialize)]
struct StatusValue {
    ready: bool,
}

/// Reads the `value.ready` flag; anything unparsable counts as not ready
#[must_use]
pub fn parse_ready(body: &str) -> bool {
    serde_json::from_str::<StatusResponse>(body)
        .map(|status| status.value.ready)
        .unwrap_or(false)
}

pub struct ReadinessProbe {
    client: Client,
    status_url: String,
    timeout: Duration,
    interval: Duration,
}

impl ReadinessProbe {
    pub fn new(webdriver: &WebDriverConfig, timing: &TimingConfig) -> Result<Self, ReadinessError> {
        let client = Client::builder()
            .timeout(timing.readiness_request_timeout())
            .build()?;

        Ok(Self {
            client,
            status_url: webdriver.status_url(),
            timeout: timing.readiness_timeout(),
            interval: timing.readiness_poll_interval(),
        })
    }

    /// One status request; transport and decode failures read as not ready
    pub async fn is_ready(&self) -> bool {
        let response = match self.client.get(&self.status_url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Status request to {} failed: {}", self.status_url, e);
                return false;
            }
        };

        match response.text().await {
            Ok(body) => parse_ready(&body),
            Err(e) => {
                debug!("Status body from {} unreadable: {}", self.status_url, e);
                false
            }
        }
    }

    /// Blocks until the hub is ready or the timeout elapses
    pub async fn wait(&self) -> Result<(), ReadinessError> {
        info!(
            "Waiting for browser hub {} for {:?}...",
            self.status_url, self.timeout
        );

        let ready = poll_until(self.timeout, self.interval, || self.is_ready()).await;
        if ready {
            info!("Browser hub is up");
            Ok(())
        } else {
            Err(ReadinessError::TimedOut {
                url: self.status_url.clone(),
                waited: self.timeout,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ready_body() {
        assert!(parse_ready(r#"{"value": {"ready": true, "message": "Selenium Grid ready."}}"#));
        assert!(!parse_ready(r#"{"value": {"ready": false}}"#));
        assert!(!parse_ready(r#"{"status": 0}"#));
        assert!(!parse_ready("<html>502 Bad Gateway</html>"));
    }

    /// Serves `body` as a JSON 200 response to every connection
    async fn serve_status(body: &'static str) -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        port
    }

    fn fast_timing() -> TimingConfig {
        TimingConfig {
            readiness_timeout_ms: 300,
            readiness_poll_interval_ms: 20,
            readiness_request_timeout_ms: 100,
            ..TimingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ready_hub_passes() {
        let port = serve_status(r#"{"value": {"ready": true}}"#).await;
        let webdriver = WebDriverConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..WebDriverConfig::default()
        };

        let probe = ReadinessProbe::new(&webdriver, &fast_timing()).unwrap();
        assert!(probe.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_busy_hub_times_out() {
        let port = serve_status(r#"{"value": {"ready": false}}"#).await;
        let webdriver = WebDriverConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..WebDriverConfig::default()
        };

        let probe = ReadinessProbe::new(&webdriver, &fast_timing()).unwrap();
        let err = probe.wait().await.unwrap_err();
        assert!(matches!(err, ReadinessError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_hub_times_out() {
        let webdriver = WebDriverConfig {
            host: "127.0.0.1".to_string(),
            // port 9 (discard) is not expected to run an HTTP server
            port: 9,
            ..WebDriverConfig::default()
        };
        let timing = TimingConfig {
            readiness_timeout_ms: 150,
            readiness_poll_interval_ms: 20,
            readiness_request_timeout_ms: 50,
            ..TimingConfig::default()
        };

        let probe = ReadinessProbe::new(&webdriver, &timing).unwrap();
        let err = probe.wait().await.unwrap_err();

        assert!(matches!(err, ReadinessError::TimedOut { .. }));
    }
}
