// Shared transport configuration for building reqwest::Client instances.
//
// The Sure Petcare cloud sits behind a public CA, so there is no TLS mode
// switch here, only timeouts, the user agent, and encoding support.

use std::time::Duration;

use crate::error::Error;

/// Default per-request timeout used by the vendor's own apps.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Product-identifying user agent sent on every request.
pub const USER_AGENT: &str = concat!("surepet/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Default per-request timeout. Individual endpoints may scale it.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

impl TransportConfig {
    /// Override the default per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a `reqwest::Client` from this config.
    ///
    /// The per-request timeout is applied by the dispatcher on each call
    /// (it varies by endpoint), so only the connect timeout is set here.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.clone())
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(Error::Transport)
    }
}
