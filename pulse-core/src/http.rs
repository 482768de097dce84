//! Minimal HTTP boundary for the public APIs the site talks to.
//!
//! The pipeline only needs unauthenticated GETs (plus a couple of token-bearing
//! GraphQL POSTs for stats prefetching), so the client trait stays small and
//! easy to script in tests. Responses carry the status and the
//! `X-RateLimit-Remaining` header so rate limiting can be reported distinctly.

use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Errors at the HTTP boundary
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network / TLS / connection failure
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Upstream refused the request because the rate limit is exhausted
    #[error("rate limit exceeded for {url}")]
    RateLimited { url: String },

    /// Non-success status other than rate limiting
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status: 404, .. })
    }
}

/// Credentials attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Bearer(String),
    Basic { user: String, password: String },
}

/// Response as seen by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `X-RateLimit-Remaining`, when the upstream sends it
    pub rate_limit_remaining: Option<u64>,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            rate_limit_remaining: None,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            rate_limit_remaining: None,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 403/429 with an exhausted rate-limit budget
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status, 403 | 429) && self.rate_limit_remaining == Some(0)
    }

    /// Turn a non-success response into the matching [`FetchError`]
    pub fn error_for_status(self, url: &str) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else if self.is_rate_limited() {
            Err(FetchError::RateLimited {
                url: url.to_string(),
            })
        } else {
            Err(FetchError::Status {
                url: url.to_string(),
                status: self.status,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Blocking HTTP client used by every upstream query
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, auth: Option<&Auth>) -> Result<HttpResponse, FetchError>;

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        auth: Option<&Auth>,
    ) -> Result<HttpResponse, FetchError>;
}

/// GET + status check + decode through a trait object
pub fn get_json<T: DeserializeOwned>(
    client: &dyn HttpClient,
    url: &str,
    auth: Option<&Auth>,
) -> Result<T, FetchError> {
    client.get(url, auth)?.error_for_status(url)?.json()
}

/// [`HttpClient`] backed by `reqwest::blocking`
pub struct ReqwestClient {
    inner: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Client identifying itself with `user_agent` (GitHub rejects requests without one)
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let inner = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { inner })
    }

    fn send(
        &self,
        url: &str,
        request: reqwest::blocking::RequestBuilder,
        auth: Option<&Auth>,
    ) -> Result<HttpResponse, FetchError> {
        let request = match auth {
            Some(Auth::Bearer(token)) => request.bearer_auth(token),
            Some(Auth::Basic { user, password }) => request.basic_auth(user, Some(password)),
            None => request,
        };

        let response = request.send().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let rate_limit_remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(HttpResponse {
            status,
            rate_limit_remaining,
            body,
        })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, auth: Option<&Auth>) -> Result<HttpResponse, FetchError> {
        let request = self
            .inner
            .get(url)
            .header("Accept", "application/json");
        self.send(url, request, auth)
    }

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        auth: Option<&Auth>,
    ) -> Result<HttpResponse, FetchError> {
        let request = self.inner.post(url).json(body);
        self.send(url, request, auth)
    }
}

/// Canned responses keyed by exact URL; unknown URLs answer 404.
///
/// Records every requested URL so tests can assert on request order and count.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    routes: std::collections::HashMap<String, Result<HttpResponse, String>>,
    requests: std::sync::Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: impl Into<String>, response: HttpResponse) -> Self {
        self.routes.insert(url.into(), Ok(response));
        self
    }

    /// Fail `url` at the transport level
    pub fn fail(mut self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.routes.insert(url.into(), Err(message.into()));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lookup(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());
        match self.routes.get(url) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(FetchError::Transport {
                url: url.to_string(),
                message: message.clone(),
            }),
            None => Ok(HttpResponse::with_status(404, r#"{"message":"Not Found"}"#)),
        }
    }
}

impl HttpClient for ScriptedClient {
    fn get(&self, url: &str, _auth: Option<&Auth>) -> Result<HttpResponse, FetchError> {
        self.lookup(url)
    }

    fn post_json(
        &self,
        url: &str,
        _body: &serde_json::Value,
        _auth: Option<&Auth>,
    ) -> Result<HttpResponse, FetchError> {
        self.lookup(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_client_defaults_to_not_found() {
        let client = ScriptedClient::new().respond("https://x/a", HttpResponse::ok("[]"));
        assert_eq!(client.get("https://x/a", None).unwrap().status, 200);
        assert_eq!(client.get("https://x/b", None).unwrap().status, 404);
        assert_eq!(client.requests(), vec!["https://x/a", "https://x/b"]);
    }

    #[test]
    fn test_rate_limit_detection_needs_exhausted_budget() {
        let mut response = HttpResponse::with_status(403, "");
        assert!(!response.is_rate_limited());

        response.rate_limit_remaining = Some(0);
        assert!(response.is_rate_limited());

        let err = response.error_for_status("https://api.github.com/x").unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_error_for_status_maps_not_found() {
        let err = HttpResponse::with_status(404, "")
            .error_for_status("https://api.github.com/repos/a/b")
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "HTTP 404 for https://api.github.com/repos/a/b");
    }

    #[test]
    fn test_decode_error() {
        let err = HttpResponse::ok("not json").json::<Vec<u32>>().unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
