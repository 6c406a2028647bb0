// Shared transport configuration for building reqwest::Client instances.
//
// The device speaks plain HTTP on the local network. Every request carries
// the fixed `user` header and is bounded by a single request-level timeout.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Error;

/// Value of the `user` header the device firmware expects on every call.
pub const USER_HEADER_VALUE: &str = "b167ecc8-87ce-47da-9b7d-cab632a2eeba";

/// Name of the fixed identification header.
pub const USER_HEADER: &str = "user";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_header: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_header: USER_HEADER_VALUE.into(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// The `user` header is injected as a default header, and the timeout
    /// applies to the whole request including reading the body.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&self.user_header)
            .map_err(|e| Error::Client(format!("invalid user header value: {e}")))?;
        headers.insert(HeaderName::from_static(USER_HEADER), value);

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("poolsync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Client(format!("failed to build HTTP client: {e}")))
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
