//! Shared HTTP plumbing for the two upstream REST APIs.

use crate::config::Config;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// UpstreamError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("unexpected response from {url}: {message}")]
    Schema { url: String, message: String },
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Timeout { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            UpstreamError::Schema {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            UpstreamError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

/// Collapse a failed layer into `None` unless the failure was a timeout.
///
/// Timeouts must surface as a stage error; everything else means the layer
/// has nothing to offer and the next one should run.
pub fn skip_layer<T>(layer: &str, result: UpstreamResult<T>) -> UpstreamResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_timeout() => Err(e),
        Err(e) => {
            tracing::warn!(layer, error = %e, "layer skipped");
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

impl Credentials {
    /// Pick bearer auth when a token is given, else basic auth.
    pub fn from_parts(
        username: Option<String>,
        password: Option<String>,
        token: Option<String>,
    ) -> Option<Self> {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            return Some(Credentials::Bearer(token));
        }
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some(Credentials::Basic { username, password })
            }
            _ => None,
        }
    }

    fn apply(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match self {
            Credentials::Basic { username, password } => req.basic_auth(username, Some(password)),
            Credentials::Bearer(token) => req.bearer_auth(token),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"***").finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    pub max_pages: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ClientSettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.timeout(),
            accept_invalid_certs: config.accept_invalid_certs,
            max_pages: config.max_pages,
        }
    }
}

/// Strip a trailing `/` and a trailing `/api` segment from a base URL.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/api").unwrap_or(trimmed);
    trimmed.trim_end_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/// Authenticated JSON client rooted at one base URL.
///
/// Blocking: build and drop it outside of an async runtime.
pub struct HttpClient {
    base: String,
    credentials: Credentials,
    settings: ClientSettings,
    inner: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        settings: ClientSettings,
    ) -> UpstreamResult<Self> {
        let base = normalize_base_url(base_url);
        let inner = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|e| UpstreamError::from_reqwest(&base, e))?;
        Ok(Self {
            base,
            credentials,
            settings,
            inner,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base, path)
        }
    }

    fn parse(&self, url: &str) -> UpstreamResult<Url> {
        Url::parse(url).map_err(|e| UpstreamError::Transport {
            url: url.to_string(),
            message: format!("invalid URL: {e}"),
        })
    }

    fn send(&self, url: Url) -> UpstreamResult<reqwest::blocking::Response> {
        tracing::debug!(url = %url, "GET");
        let shown = url.to_string();
        let req = self
            .credentials
            .apply(self.inner.get(url).header("Accept", "application/json"));
        req.send().map_err(|e| UpstreamError::from_reqwest(&shown, e))
    }

    /// GET `path` and return the status code without reading the body.
    pub fn get_status(&self, path: &str) -> UpstreamResult<u16> {
        let url = self.parse(&self.url(path))?;
        Ok(self.send(url)?.status().as_u16())
    }

    /// GET `path` and decode a JSON body. Non-2xx is an error.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> UpstreamResult<T> {
        let url = self.parse(&self.url(path))?;
        self.fetch_json(url)
    }

    fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> UpstreamResult<T> {
        let shown = url.to_string();
        let resp = self.send(url)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: shown,
                status: status.as_u16(),
            });
        }
        let text = resp
            .text()
            .map_err(|e| UpstreamError::from_reqwest(&shown, e))?;
        serde_json::from_str(&text).map_err(|e| UpstreamError::Schema {
            url: shown,
            message: e.to_string(),
        })
    }

    /// GET a paginated list (`{"results": [...], "next": ...}`), following
    /// `next` links up to the configured page bound. `query` is encoded onto
    /// the first page; later pages carry it in their `next` link.
    pub fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> UpstreamResult<Vec<T>> {
        let mut first = self.parse(&self.url(path))?;
        if !query.is_empty() {
            first.query_pairs_mut().extend_pairs(query);
        }

        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;
        while let Some(page) = next.take() {
            if pages == self.settings.max_pages {
                tracing::warn!(path, pages, "pagination bound reached");
                break;
            }
            pages += 1;
            let body: Value = self.fetch_json(page.clone())?;
            let results = body
                .get("results")
                .cloned()
                .ok_or_else(|| UpstreamError::Schema {
                    url: page.to_string(),
                    message: "missing 'results'".into(),
                })?;
            let batch: Vec<T> =
                serde_json::from_value(results).map_err(|e| UpstreamError::Schema {
                    url: page.to_string(),
                    message: e.to_string(),
                })?;
            items.extend(batch);
            // Host-relative links resolve against the page's origin.
            next = match body.get("next").and_then(Value::as_str) {
                Some(link) if !link.is_empty() => Some(page.join(link).map_err(|e| {
                    UpstreamError::Schema {
                        url: page.to_string(),
                        message: format!("bad 'next' link '{link}': {e}"),
                    }
                })?),
                _ => None,
            };
        }
        Ok(items)
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base", &self.base)
            .field("credentials", &self.credentials)
            .finish()
    }
}
