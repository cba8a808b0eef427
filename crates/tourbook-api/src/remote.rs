//! Remote existence checks against other services
//!
//! A check is `GET {base}/{resource}/{id}` carrying the caller's session.
//! "Does not exist" (`Ok(false)`) and "could not find out" (`Err`) are kept
//! apart so callers can fail closed on the latter.

use axum::http::{header, HeaderMap};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tourbook_core::{RemoteConfig, ServiceUrls, UserStatus};

/// Remote verification errors; all of them mean "service unavailable"
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not reach {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("{url} answered with status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("malformed response from {url}: {reason}")]
    MalformedBody { url: String, reason: String },

    #[error("invalid remote url: {0}")]
    InvalidUrl(String),

    #[error("http client error: {0}")]
    Client(String),
}

/// Caller credentials forwarded on remote checks
#[derive(Debug, Clone, Default)]
pub struct ForwardedSession {
    pub cookie: Option<String>,
    pub authorization: Option<String>,
}

impl ForwardedSession {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            cookie: get(header::COOKIE),
            authorization: get(header::AUTHORIZATION),
        }
    }

    pub fn with_cookie(cookie: impl Into<String>) -> Self {
        Self {
            cookie: Some(cookie.into()),
            authorization: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
}

/// Result of one entity check inside a multi-entity verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Exists,
    Missing,
    Unavailable(String),
}

/// Outcomes for the two entities a review references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewReferences {
    pub user: VerificationOutcome,
    pub tour: VerificationOutcome,
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
}

impl RemoteClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RemoteError::Client(e.to_string()))?;
        Ok(Self { http })
    }

    fn resource_url(base_url: &str, resource_path: &str, id: &str) -> Result<Url, RemoteError> {
        let mut url = Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(base_url.to_string()))?
            .pop_if_empty()
            .extend(resource_path.split('/').filter(|s| !s.is_empty()))
            .push(id);
        Ok(url)
    }

    /// Fetch the `data` payload of a resource
    ///
    /// `Ok(None)` for 404 or a 2xx without `success: true` and non-null `data`.
    pub async fn fetch(
        &self,
        base_url: &str,
        resource_path: &str,
        id: &str,
        session: &ForwardedSession,
    ) -> Result<Option<Value>, RemoteError> {
        let url = Self::resource_url(base_url, resource_path, id)?;
        let url_text = url.to_string();

        let mut request = self.http.get(url);
        if let Some(cookie) = &session.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        if let Some(authorization) = &session.authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout {
                    url: url_text.clone(),
                }
            } else if e.is_connect() {
                RemoteError::Connect {
                    url: url_text.clone(),
                    reason: e.to_string(),
                }
            } else {
                RemoteError::Client(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RemoteError::UnexpectedStatus {
                url: url_text,
                status: status.as_u16(),
            });
        }

        let envelope: Envelope = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout {
                    url: url_text.clone(),
                }
            } else {
                RemoteError::MalformedBody {
                    url: url_text.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let success = envelope.success;
        Ok(envelope.data.filter(|data| success && !data.is_null()))
    }

    pub async fn verify_exists(
        &self,
        base_url: &str,
        resource_path: &str,
        id: &str,
        session: &ForwardedSession,
    ) -> Result<bool, RemoteError> {
        Ok(self
            .fetch(base_url, resource_path, id, session)
            .await?
            .is_some())
    }

    /// A user counts as existing only while its status is Active
    async fn verify_active_user(
        &self,
        services: &ServiceUrls,
        user_id: &str,
        session: &ForwardedSession,
    ) -> Result<bool, RemoteError> {
        let data = self
            .fetch(&services.user, "api/v1/user", user_id, session)
            .await?;
        Ok(data
            .as_ref()
            .and_then(|d| d.get("status"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<UserStatus>().ok())
            .is_some_and(|s| s.is_active()))
    }

    /// Check the user and tour of a new review concurrently
    pub async fn verify_review_references(
        &self,
        services: &ServiceUrls,
        user_id: &str,
        tour_id: &str,
        session: &ForwardedSession,
    ) -> ReviewReferences {
        let (user, tour) = tokio::join!(
            self.verify_active_user(services, user_id, session),
            self.verify_exists(&services.tour, "api/v1/tour", tour_id, session),
        );

        ReviewReferences {
            user: outcome(user),
            tour: outcome(tour),
        }
    }
}

fn outcome(result: Result<bool, RemoteError>) -> VerificationOutcome {
    match result {
        Ok(true) => VerificationOutcome::Exists,
        Ok(false) => VerificationOutcome::Missing,
        Err(e) => VerificationOutcome::Unavailable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url_joins_segments() {
        let url =
            RemoteClient::resource_url("http://localhost:4003/", "/api/v1/tour/", "t-1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:4003/api/v1/tour/t-1");

        let url = RemoteClient::resource_url("http://localhost:4003", "api/v1/tour", "a/b").unwrap();
        assert_eq!(url.as_str(), "http://localhost:4003/api/v1/tour/a%2Fb");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            RemoteClient::resource_url("not a url", "api", "1"),
            Err(RemoteError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(outcome(Ok(true)), VerificationOutcome::Exists);
        assert_eq!(outcome(Ok(false)), VerificationOutcome::Missing);
        assert!(matches!(
            outcome(Err(RemoteError::Timeout {
                url: "http://x".to_string()
            })),
            VerificationOutcome::Unavailable(_)
        ));
    }

    #[test]
    fn test_forwarded_session_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "accessToken=abc".parse().unwrap());

        let session = ForwardedSession::from_headers(&headers);
        assert_eq!(session.cookie.as_deref(), Some("accessToken=abc"));
        assert!(session.authorization.is_none());
    }
}
