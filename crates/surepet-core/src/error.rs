// ── Core error types ──
//
// User-facing errors from surepet-core. Consumers never see raw HTTP
// statuses or JSON parse failures directly; the `From<surepet_api::Error>`
// impl translates transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to Sure Petcare at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {id}")]
    DeviceNotFound { id: i64 },

    #[error("Pet not found: {id}")]
    PetNotFound { id: i64 },

    // ── Operation errors ─────────────────────────────────────────────
    /// The server's echo of a control command did not match the request.
    /// The hardware may be in an unintended state.
    #[error("{command} on {target} not confirmed (requested {requested}, server reported {reported}) - check the device")]
    CommandNotConfirmed {
        command: &'static str,
        target: i64,
        requested: String,
        reported: String,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Connection-family failures a caller may want to retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Timeout { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<surepet_api::Error> for CoreError {
    fn from(err: surepet_api::Error) -> Self {
        match err {
            surepet_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            surepet_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: e.to_string(),
            },
            surepet_api::Error::Timeout { timeout_secs, .. } => CoreError::Timeout { timeout_secs },
            surepet_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            surepet_api::Error::InvalidHeader { name } => {
                CoreError::Internal(format!("could not encode {name} header"))
            }
            surepet_api::Error::Protocol { status, url } => CoreError::Api {
                message: format!("unexpected HTTP {status} from {url}"),
                status: Some(status),
            },
            surepet_api::Error::Deserialization { message, .. } => CoreError::Api {
                message: format!("malformed response: {message}"),
                status: None,
            },
        }
    }
}
