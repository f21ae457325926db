// Bearer-token lifecycle
//
// The Sure Petcare API authenticates every request with a long opaque
// bearer token. The token is obtained by logging in with email/password
// or handed in from outside (env var, token file). This module owns the
// held credential; the dispatcher drives login through `ensure_token`.

use std::future::Future;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Error;

/// Tokens at or below this length are rejected as implausible.
pub const TOKEN_MIN_LEN: usize = 320;
/// Tokens at or above this length are rejected as implausible.
pub const TOKEN_MAX_LEN: usize = 448;

/// Shape check for an externally supplied token.
///
/// ASCII, printable, and strictly between [`TOKEN_MIN_LEN`] and
/// [`TOKEN_MAX_LEN`] characters. Not a cryptographic validation.
pub fn token_seems_valid(token: &str) -> bool {
    let len = token.len();
    len > TOKEN_MIN_LEN
        && len < TOKEN_MAX_LEN
        && token.bytes().all(|b| b == b' ' || b.is_ascii_graphic())
}

/// Email/password pair for `POST /auth/login`.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: SecretString,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }
}

/// Pluggable strategy for discovering a pre-issued token.
///
/// Implementations decide where to look (environment, files, keychains);
/// the token manager only checks plausibility of what they return.
pub trait TokenSource: Send + Sync {
    fn resolve(&self) -> Option<SecretString>;
}

impl TokenSource for SecretString {
    fn resolve(&self) -> Option<SecretString> {
        Some(self.clone())
    }
}

impl<T: TokenSource + ?Sized> TokenSource for Box<T> {
    fn resolve(&self) -> Option<SecretString> {
        (**self).resolve()
    }
}

/// A bearer token as handed out by [`TokenManager::ensure_token`].
///
/// Carries the epoch it was issued in so a late 401 for an old token
/// cannot wipe out a newer one.
#[derive(Debug, Clone)]
pub struct Credential {
    token: SecretString,
    epoch: u64,
}

impl Credential {
    pub fn expose(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<SecretString>,
    epoch: u64,
}

impl TokenState {
    fn install(&mut self, token: SecretString) -> Credential {
        self.epoch += 1;
        self.token = Some(token.clone());
        Credential {
            token,
            epoch: self.epoch,
        }
    }

    fn credential(&self) -> Option<Credential> {
        self.token.as_ref().map(|token| Credential {
            token: token.clone(),
            epoch: self.epoch,
        })
    }
}

/// Holds the current bearer token and serializes re-authentication.
///
/// The state sits behind an async mutex that stays locked for the whole
/// login round-trip, so concurrent callers that all found the token
/// missing end up sharing a single login.
#[derive(Debug, Default)]
pub struct TokenManager {
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with whatever token `source` yields, if it looks plausible.
    pub fn from_source(source: &dyn TokenSource) -> Self {
        let mut manager = Self::new();
        if let Some(token) = source.resolve() {
            manager.seed(token);
        }
        manager
    }

    /// Install an externally supplied token before the manager is shared.
    ///
    /// Returns `false` (and keeps the previous state) if the token fails
    /// [`token_seems_valid`].
    pub fn seed(&mut self, token: SecretString) -> bool {
        if !token_seems_valid(token.expose_secret()) {
            warn!("ignoring implausible auth token");
            return false;
        }
        self.state.get_mut().install(token);
        true
    }

    /// Replace the held token at runtime. Same plausibility rule as [`seed`](Self::seed).
    pub async fn set_token(&self, token: SecretString) -> bool {
        if !token_seems_valid(token.expose_secret()) {
            warn!("ignoring implausible auth token");
            return false;
        }
        self.state.lock().await.install(token);
        true
    }

    /// The currently held credential, without triggering a login.
    pub async fn current(&self) -> Option<Credential> {
        self.state.lock().await.credential()
    }

    /// Return the held credential, logging in via `login` if there is none.
    ///
    /// `login` resolves to `Ok(None)` when the server answered without
    /// issuing a new token (e.g. 304); with nothing held that is an
    /// authentication failure.
    pub async fn ensure_token<F, Fut>(&self, login: F) -> Result<Credential, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<SecretString>, Error>>,
    {
        let mut state = self.state.lock().await;
        if let Some(credential) = state.credential() {
            return Ok(credential);
        }

        debug!("no credential held, authenticating");
        match login().await? {
            Some(token) => {
                let credential = state.install(token);
                debug!(epoch = credential.epoch, "credential obtained");
                Ok(credential)
            }
            None => Err(Error::Authentication {
                message: "login did not issue a token".into(),
            }),
        }
    }

    /// Drop `credential` if it is still the one being held.
    ///
    /// Returns `true` if the held token was cleared.
    pub async fn invalidate(&self, credential: &Credential) -> bool {
        let mut state = self.state.lock().await;
        if state.token.is_some() && state.epoch == credential.epoch {
            debug!(epoch = credential.epoch, "invalidating credential");
            state.token = None;
            true
        } else {
            false
        }
    }

    /// Forget any held token.
    pub async fn clear(&self) {
        self.state.lock().await.token = None;
    }
}
