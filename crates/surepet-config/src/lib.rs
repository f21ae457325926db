//! Profile configuration for Sure Petcare tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! token discovery as a [`TokenSource`], and translation to
//! `surepet_core::PetcareConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use surepet_api::{TokenSource, token_seems_valid};
use surepet_core::{AuthCredentials, BatteryProfile, DEFAULT_TIMELINE_ENTRIES, PetcareConfig};

/// Environment variable checked first for a pre-issued token.
pub const TOKEN_ENV: &str = "SUREPY_TOKEN";

/// Token file name under the home directory.
pub const TOKEN_FILE_NAME: &str = ".surepy.token";

const KEYRING_SERVICE: &str = "surepet";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The named profile, or the default one when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(name, profile)| (name.as_str(), profile))
            .ok_or_else(|| ConfigError::Validation {
                field: "profile".into(),
                reason: format!("no profile named '{name}'"),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Cells in a device's battery pack.
    #[serde(default = "default_battery_count")]
    pub battery_count: u32,

    #[serde(default = "default_timeline_entries")]
    pub timeline_entries: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            battery_count: default_battery_count(),
            timeline_entries: default_timeline_entries(),
        }
    }
}

fn default_timeout() -> u64 {
    45
}
fn default_battery_count() -> u32 {
    4
}
fn default_timeline_entries() -> usize {
    DEFAULT_TIMELINE_ENTRIES
}

/// A named account profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Account email for login.
    pub email: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Pre-issued bearer token (plaintext, prefer the token file).
    pub token: Option<String>,

    /// Token file; defaults to `~/.surepy.token`.
    pub token_file: Option<PathBuf>,

    /// Override the API root.
    pub base_url: Option<String>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override battery cell count.
    pub battery_count: Option<u32>,

    /// Override how far back to scan the household timeline.
    pub timeline_entries: Option<usize>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "surepet", "surepet").map_or_else(
        || {
            let mut p = home_dir();
            p.push(".config");
            p.push("surepet");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default token file location.
pub fn default_token_file() -> PathBuf {
    home_dir().join(TOKEN_FILE_NAME)
}

fn home_dir() -> PathBuf {
    BaseDirs::new().map_or_else(|| PathBuf::from("."), |dirs| dirs.home_dir().to_path_buf())
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path` + environment. A missing file is not an error.
///
/// Environment keys use `__` as the nesting separator, e.g.
/// `SUREPY_DEFAULTS__TIMEOUT=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SUREPY_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "loaded config");
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token discovery ─────────────────────────────────────────────────

/// Looks for a pre-issued token in the environment, then the token file,
/// then the profile. Implausible candidates are skipped.
#[derive(Debug, Clone)]
pub struct ProfileTokenSource {
    env_var: String,
    token_file: PathBuf,
    profile_token: Option<String>,
}

impl ProfileTokenSource {
    pub fn for_profile(profile: &Profile) -> Self {
        Self {
            env_var: TOKEN_ENV.to_owned(),
            token_file: profile.token_file.clone().unwrap_or_else(default_token_file),
            profile_token: profile.token.clone(),
        }
    }

    /// Read the token from a different environment variable.
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    fn from_env(&self) -> Option<String> {
        std::env::var(&self.env_var).ok()
    }

    fn from_file(&self) -> Option<String> {
        std::fs::read_to_string(&self.token_file)
            .ok()
            .map(|contents| contents.trim().to_owned())
    }
}

impl TokenSource for ProfileTokenSource {
    fn resolve(&self) -> Option<SecretString> {
        let candidates = [
            ("env", self.from_env()),
            ("file", self.from_file()),
            ("profile", self.profile_token.clone()),
        ];

        candidates.into_iter().find_map(|(origin, candidate)| {
            let token = candidate?;
            if token_seems_valid(&token) {
                debug!(origin, "using discovered token");
                Some(SecretString::from(token))
            } else {
                debug!(origin, "ignoring implausible token");
                None
            }
        })
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the login password from the credential chain.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring, keyed by email
    if let Some(ref email) = profile.email {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, email) {
            if let Ok(secret) = entry.get_password() {
                return Ok(SecretString::from(secret));
            }
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store `password` in the system keyring under the profile's email.
pub fn store_password(profile: &Profile, password: &str) -> Result<(), ConfigError> {
    let email = profile.email.as_deref().ok_or_else(|| ConfigError::Validation {
        field: "email".into(),
        reason: "required to store a password".into(),
    })?;
    keyring::Entry::new(KEYRING_SERVICE, email)
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "password".into(),
            reason: format!("keyring: {e}"),
        })
}

/// Combine token discovery and login credentials into `AuthCredentials`.
pub fn resolve_auth(
    profile: &Profile,
    profile_name: &str,
    tokens: &dyn TokenSource,
) -> Result<AuthCredentials, ConfigError> {
    let token = tokens.resolve();
    let login = match profile.email {
        Some(ref email) => match resolve_password(profile, profile_name) {
            Ok(password) => Some((email.clone(), password)),
            Err(ConfigError::NoCredentials { .. }) if token.is_some() => None,
            Err(e) => return Err(e),
        },
        None => None,
    };

    match (token, login) {
        (Some(token), Some((email, password))) => Ok(AuthCredentials::Hybrid {
            token,
            email,
            password,
        }),
        (Some(token), None) => Ok(AuthCredentials::Token(token)),
        (None, Some((email, password))) => Ok(AuthCredentials::Login { email, password }),
        (None, None) => Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        }),
    }
}

/// Build a `PetcareConfig` from a profile, with `defaults` filling the
/// gaps.
pub fn profile_to_petcare_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<PetcareConfig, ConfigError> {
    let tokens = ProfileTokenSource::for_profile(profile);
    let auth = resolve_auth(profile, profile_name, &tokens)?;

    let battery_count = profile.battery_count.unwrap_or(defaults.battery_count);
    if battery_count == 0 {
        return Err(ConfigError::Validation {
            field: "battery_count".into(),
            reason: "must be at least 1".into(),
        });
    }

    let mut config = PetcareConfig::new(auth)
        .with_timeout(Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)));
    config.battery = BatteryProfile::default().with_count(battery_count);
    config.timeline_entries = profile.timeline_entries.unwrap_or(defaults.timeline_entries);

    if let Some(ref base_url) = profile.base_url {
        let url = base_url.parse().map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {base_url}"),
        })?;
        config = config.with_base_url(url);
    }

    Ok(config)
}
