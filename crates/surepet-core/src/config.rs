// ── Runtime connection configuration ──
//
// These types describe how to talk to the Sure Petcare cloud. They carry
// credential data and tuning, but never touch disk or the environment.
// Callers (or surepet-config) construct a `PetcareConfig` and hand it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use surepet_api::{DEFAULT_BASE_URL, LoginCredentials, transport};

use crate::error::CoreError;
use crate::model::BatteryProfile;

/// Timeline entries scanned for anonymous drink events.
pub const DEFAULT_TIMELINE_ENTRIES: usize = 50;

/// How to authenticate with the API.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Pre-issued bearer token. Cannot be renewed once rejected.
    Token(SecretString),
    /// Email/password login on first use and after every 401.
    Login { email: String, password: SecretString },
    /// Start with the token, fall back to logging in when it is rejected.
    Hybrid {
        token: SecretString,
        email: String,
        password: SecretString,
    },
}

impl AuthCredentials {
    pub(crate) fn token(&self) -> Option<&SecretString> {
        match self {
            Self::Token(token) | Self::Hybrid { token, .. } => Some(token),
            Self::Login { .. } => None,
        }
    }

    pub(crate) fn login(&self) -> Option<LoginCredentials> {
        match self {
            Self::Login { email, password } | Self::Hybrid { email, password, .. } => {
                Some(LoginCredentials::new(email.clone(), password.clone()))
            }
            Self::Token(_) => None,
        }
    }
}

/// Configuration for one account.
#[derive(Debug, Clone)]
pub struct PetcareConfig {
    /// API root; `None` means the production endpoint.
    pub base_url: Option<Url>,
    pub auth: AuthCredentials,
    /// Per-request timeout. The notification endpoint uses twice this.
    pub timeout: Duration,
    pub battery: BatteryProfile,
    /// How far back to look on the household timeline for water-station
    /// events. Fetched in pages of 25.
    pub timeline_entries: usize,
}

impl PetcareConfig {
    pub fn new(auth: AuthCredentials) -> Self {
        Self {
            base_url: None,
            auth,
            timeout: transport::DEFAULT_TIMEOUT,
            battery: BatteryProfile::default(),
            timeline_entries: DEFAULT_TIMELINE_ENTRIES,
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn resolved_base_url(&self) -> Result<Url, CoreError> {
        match &self.base_url {
            Some(url) => Ok(url.clone()),
            None => Url::parse(DEFAULT_BASE_URL).map_err(|e| CoreError::Config {
                message: format!("invalid default base URL: {e}"),
            }),
        }
    }
}
