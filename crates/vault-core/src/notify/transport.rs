//! HTTP transport for webhook delivery

use std::fmt;
use std::time::Duration;

use crate::{Error, Result};

/// Posts a JSON body and reports the response status.
pub trait WebhookTransport: fmt::Debug + Send + Sync {
    /// POST `body` to `url`, returning the HTTP status code.
    ///
    /// Transport-level failures (DNS, connect, timeout) are errors; any
    /// received response, successful or not, is a status.
    fn post(&self, url: &str, body: &str) -> Result<u16>;
}

/// Blocking reqwest transport with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("confvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Notification {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl WebhookTransport for HttpTransport {
    fn post(&self, url: &str, body: &str) -> Result<u16> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .map_err(|e| Error::Notification {
                message: e.to_string(),
            })?;
        Ok(response.status().as_u16())
    }
}
