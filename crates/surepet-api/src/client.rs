// Sure Petcare HTTP dispatcher
//
// Wraps `reqwest::Client` with the vendor's header set, conditional GET
// through the resource cache, and the 401 -> re-login -> retry-once
// protocol. Endpoint wrappers live in `endpoints.rs` as inherent methods
// so this module stays focused on transport mechanics.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, AUTHORIZATION, ETAG, HeaderMap, HeaderValue,
    IF_NONE_MATCH, ORIGIN, REFERER, USER_AGENT,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, info, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::{Credential, LoginCredentials, TokenManager, TokenSource};
use crate::cache::ResourceCache;
use crate::error::Error;
use crate::transport::{self, TransportConfig};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://app-api.blue.production.surehub.io/api";

const AUTH_PATH: &str = "auth/login";
const APP_ORIGIN: &str = "https://surepetcare.io";
const APP_PACKAGE: &str = "com.sureflap.surepetcare";

/// HTTP verbs the vendor API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// Async client for the Sure Petcare cloud API.
///
/// Every call goes through [`call`](Self::call): a credential is ensured
/// (logging in if needed), the standard header set is attached, GETs are
/// made conditional on the cached ETag, and a single 401 triggers exactly
/// one re-authentication and retry with the same method and body.
pub struct SureClient {
    http: reqwest::Client,
    /// `true` when `http` was built here rather than handed in.
    owns_transport: bool,
    base_url: Url,
    device_id: String,
    user_agent: String,
    timeout: Duration,
    login: Option<LoginCredentials>,
    tokens: TokenManager,
    cache: ResourceCache,
}

impl SureClient {
    /// Create a client with its own connection pool built from `transport`.
    ///
    /// `login` may be `None` when a token is supplied via
    /// [`with_token`](Self::with_token); a rejected token then cannot be
    /// renewed and surfaces as [`Error::Authentication`].
    pub fn new(
        base_url: Url,
        login: Option<LoginCredentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            owns_transport: true,
            user_agent: transport.user_agent.clone(),
            timeout: transport.timeout,
            ..Self::with_client(http, base_url, login)
        })
    }

    /// Create a client around a caller-owned `reqwest::Client`.
    ///
    /// The pool stays shared with the caller and lives as long as any
    /// clone of it does.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        login: Option<LoginCredentials>,
    ) -> Self {
        Self {
            http,
            owns_transport: false,
            base_url,
            device_id: Uuid::new_v4().to_string(),
            user_agent: transport::USER_AGENT.to_owned(),
            timeout: transport::DEFAULT_TIMEOUT,
            login,
            tokens: TokenManager::new(),
            cache: ResourceCache::new(),
        }
    }

    /// Seed a pre-issued token (ignored unless it looks plausible).
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.tokens.seed(token);
        self
    }

    /// Seed a token from a discovery strategy (env var, token file, ...).
    pub fn with_token_source(mut self, source: &dyn TokenSource) -> Self {
        if let Some(token) = source.resolve() {
            self.tokens.seed(token);
        }
        self
    }

    /// Override the default per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Random per-client identifier sent as `X-Device-Id` and at login.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the connection pool was created by this client.
    pub fn owns_transport(&self) -> bool {
        self.owns_transport
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Force a fresh login, replacing any held token.
    pub async fn authenticate(&self) -> Result<Credential, Error> {
        self.tokens.clear().await;
        self.tokens.ensure_token(|| self.request_token()).await
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build `{base}/{path}`; `path` may carry a query string.
    pub(crate) fn api_url(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    // ── Headers ──────────────────────────────────────────────────────

    /// Headers the vendor's mobile app sends, minus `Authorization`.
    fn standard_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en-GB;q=0.9"));
        headers.insert(ORIGIN, HeaderValue::from_static(APP_ORIGIN));
        headers.insert(REFERER, HeaderValue::from_static(APP_ORIGIN));
        headers.insert("x-requested-with", HeaderValue::from_static(APP_PACKAGE));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|_| Error::InvalidHeader { name: "User-Agent" })?,
        );
        headers.insert(
            "x-device-id",
            HeaderValue::from_str(&self.device_id)
                .map_err(|_| Error::InvalidHeader { name: "X-Device-Id" })?,
        );
        Ok(headers)
    }

    // ── Authentication ───────────────────────────────────────────────

    /// `POST /auth/login`. Yields `None` when the server answers 304.
    async fn request_token(&self) -> Result<Option<SecretString>, Error> {
        let Some(credentials) = self.login.as_ref() else {
            return Err(Error::Authentication {
                message: "no valid token and no login credentials configured".into(),
            });
        };

        let url = self.api_url(AUTH_PATH);
        debug!("logging in at {url}");

        let body = json!({
            "email_address": credentials.email,
            "password": credentials.password.expose_secret(),
            "device_id": self.device_id,
        });

        let resp = self
            .http
            .post(&url)
            .headers(self.standard_headers()?)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::from_send(e, &url, self.timeout))?;

        match resp.status() {
            StatusCode::OK => {
                let body = read_json(resp, &url, self.timeout).await?;
                let token = body
                    .pointer("/data/token")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::Authentication {
                        message: "login response carried no data.token".into(),
                    })?;
                debug!("login successful");
                Ok(Some(SecretString::from(token.to_owned())))
            }
            StatusCode::NOT_MODIFIED => {
                debug!("login answered 304, no new token");
                Ok(None)
            }
            StatusCode::UNAUTHORIZED => {
                warn!("login rejected");
                Err(Error::Authentication {
                    message: "login rejected, check email and password".into(),
                })
            }
            status => {
                debug!(status = status.as_u16(), "unexpected login response");
                Err(Error::Protocol {
                    status: status.as_u16(),
                    url,
                })
            }
        }
    }

    // ── Request protocol ─────────────────────────────────────────────

    /// Issue a request with the default timeout.
    ///
    /// Returns the whole parsed body (callers extract `data`), the cached
    /// body on 304, or `None` for soft failures (unexpected status) and
    /// for `204 No Content` on DELETE.
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Option<Arc<Value>>, Error> {
        self.call_with_timeout(method, url, body, self.timeout).await
    }

    /// Issue a request with an explicit per-call timeout.
    pub async fn call_with_timeout(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Option<Arc<Value>>, Error> {
        let mut retried = false;

        loop {
            let credential = self.tokens.ensure_token(|| self.request_token()).await?;
            let resp = self.send(method, url, body, &credential, timeout).await?;
            let status = resp.status();

            match status {
                StatusCode::OK | StatusCode::CREATED => {
                    let etag = resp
                        .headers()
                        .get(ETAG)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let value = read_json(resp, url, timeout).await?;
                    debug!(
                        %method,
                        url,
                        entries = value.get("data").map_or(0, data_len),
                        "response received"
                    );
                    return Ok(Some(self.cache.put(url, value, etag)));
                }
                StatusCode::NOT_MODIFIED => {
                    debug!(%method, url, "etag matched, no new data");
                    return Ok(self.cache.body(url));
                }
                StatusCode::UNAUTHORIZED => {
                    warn!(%method, url, retried, "request unauthorized");
                    self.tokens.invalidate(&credential).await;
                    if retried {
                        return Err(Error::Authentication {
                            message: format!(
                                "{method} {url} still unauthorized after re-authentication"
                            ),
                        });
                    }
                    retried = true;
                }
                StatusCode::NO_CONTENT if method == Method::Delete => {
                    debug!(%method, url, "no content");
                    return Ok(None);
                }
                _ => {
                    info!(%method, url, status = status.as_u16(), "request failed, returning empty result");
                    return Ok(None);
                }
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        credential: &Credential,
        timeout: Duration,
    ) -> Result<reqwest::Response, Error> {
        let mut headers = self.standard_headers()?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| Error::InvalidHeader {
                name: "Authorization",
            })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        // Control commands stay unconditional; only reads revalidate.
        if method == Method::Get {
            if let Some(etag) = self.cache.etag(url) {
                trace!(url, etag, "conditional request");
                if let Ok(value) = HeaderValue::from_str(etag_echo(&etag)) {
                    headers.insert(ETAG, value);
                }
                if let Ok(value) = HeaderValue::from_str(&if_none_match(&etag)) {
                    headers.insert(IF_NONE_MATCH, value);
                }
            }
        }

        debug!("{method} {url}");

        let mut builder = self
            .http
            .request(method.into(), url)
            .headers(headers)
            .timeout(timeout);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder
            .send()
            .await
            .map_err(|e| Error::from_send(e, url, timeout))
    }
}

/// Read and parse a JSON body, keeping the raw text on failure.
async fn read_json(resp: reqwest::Response, url: &str, timeout: Duration) -> Result<Value, Error> {
    let body = resp
        .text()
        .await
        .map_err(|e| Error::from_send(e, url, timeout))?;
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })
}

/// The vendor `Etag` request header carries the bare tag.
fn etag_echo(raw: &str) -> &str {
    raw.strip_prefix("W/").unwrap_or(raw).trim_matches('"')
}

/// A well-formed entity tag goes back verbatim; a bare one gets quoted.
fn if_none_match(raw: &str) -> String {
    if raw.starts_with('"') || raw.starts_with("W/\"") {
        raw.to_owned()
    } else {
        format!("\"{raw}\"")
    }
}

fn data_len(data: &Value) -> usize {
    match data {
        Value::Array(items) => items.len(),
        Value::Object(fields) => fields.len(),
        Value::Null => 0,
        _ => 1,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> SureClient {
        SureClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap(), None)
    }

    #[test]
    fn api_url_joins_without_losing_prefix() {
        let c = client("https://app-api.blue.production.surehub.io/api");
        assert_eq!(
            c.api_url("me/start"),
            "https://app-api.blue.production.surehub.io/api/me/start"
        );
        assert_eq!(
            c.api_url("/timeline/household/3?page=2"),
            "https://app-api.blue.production.surehub.io/api/timeline/household/3?page=2"
        );
    }

    #[test]
    fn standard_headers_carry_device_id() {
        let c = client("https://example.invalid/api");
        let headers = c.standard_headers().unwrap();
        assert_eq!(headers["x-device-id"], c.device_id());
        assert_eq!(headers[ACCEPT_ENCODING], "gzip, deflate");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn caller_supplied_transport_is_not_owned() {
        let c = client("https://example.invalid/api");
        assert!(!c.owns_transport());

        let owned = SureClient::new(
            Url::parse("https://example.invalid/api").unwrap(),
            None,
            &TransportConfig::default(),
        )
        .unwrap();
        assert!(owned.owns_transport());
    }

    #[test]
    fn conditional_headers_keep_weak_validators_intact() {
        assert_eq!(if_none_match("W/\"abc\""), "W/\"abc\"");
        assert_eq!(etag_echo("W/\"abc\""), "abc");

        assert_eq!(if_none_match("\"v1\""), "\"v1\"");
        assert_eq!(etag_echo("\"v1\""), "v1");

        assert_eq!(if_none_match("v1"), "\"v1\"");
        assert_eq!(etag_echo("v1"), "v1");
    }

    #[test]
    fn method_display() {
        assert_eq!(Method::Put.to_string(), "PUT");
        assert_eq!(reqwest::Method::from(Method::Delete), reqwest::Method::DELETE);
    }
}
