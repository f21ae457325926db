use thiserror::Error;

/// Top-level error type for the `surepet-api` crate.
///
/// Three families matter to callers: authentication (login rejected or the
/// single 401 retry exhausted), connection (timeout or transport failure)
/// and protocol (a status the dispatcher cannot classify).
/// `surepet-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected, no credentials available, or a call was still
    /// unauthorized after re-authenticating once.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, reset, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request exceeded its per-call timeout.
    #[error("Request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header value (token, device id) could not be encoded.
    #[error("Invalid header value for {name}")]
    InvalidHeader { name: &'static str },

    // ── Protocol ────────────────────────────────────────────────────
    /// Unexpected HTTP status on a request that cannot degrade softly
    /// (currently only the login endpoint).
    #[error("Unexpected HTTP {status} from {url}")]
    Protocol { status: u16, url: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the credential was rejected.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` for timeouts and transport-level failures.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }

    /// Returns `true` for unclassifiable HTTP statuses.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Translate a `reqwest` failure, promoting timeouts to [`Error::Timeout`].
    pub(crate) fn from_send(err: reqwest::Error, url: &str, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_owned(),
                timeout_secs: timeout.as_secs(),
            }
        } else {
            Self::Transport(err)
        }
    }
}
