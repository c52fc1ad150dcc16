use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use shared::{domain::Entity, error::ApiErrorBody};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub mod controller;
pub mod forms;
pub mod notice;
pub mod query;
pub mod render;
pub mod session;
pub mod table;
pub mod tabs;
pub mod view;

pub use controller::{Outcome, ViewController};
pub use notice::{Notice, NoticeLevel, Notifier, RecordingNotifier};
pub use query::Filters;
pub use table::{SortOrder, Table, TableWidget, ViewOptions};
pub use tabs::{Tab, TabConfig};
pub use view::{ActiveView, ViewState};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("invalid API url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request to {path} failed: {message}")]
    Transport { path: String, message: String },
    #[error("{path} returned HTTP {status}")]
    Status {
        path: String,
        status: u16,
        detail: Option<String>,
    },
    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }

    /// Server-provided `detail` message, when the error body carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            FetchError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// `401 Unauthorized`, `500 Internal Server Error`, ...
    pub fn status_line(&self) -> Option<String> {
        let status = self.status()?;
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("");
        Some(format!("{status} {reason}").trim_end().to_string())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}

/// HTTP seam between view controllers and the fest API.
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn get_collection(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Vec<Entity>, FetchError>;
    async fn get_record(&self, path: &str) -> Result<Entity, FetchError>;
    async fn post_json(&self, path: &str, body: &Value) -> Result<Entity, FetchError>;
}

pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|err| FetchError::InvalidUrl {
            url: base_url.clone(),
            message: err.to_string(),
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport {
                path: base_url.clone(),
                message: err.to_string(),
            })?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, FetchError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|err| FetchError::InvalidUrl {
            url: raw,
            message: err.to_string(),
        })
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, FetchError> {
        let response = request.send().await.map_err(|err| {
            warn!(path, error = %err, "api: transport failure");
            FetchError::Transport {
                path: path.to_string(),
                message: if err.is_timeout() {
                    "request timed out".to_string()
                } else {
                    err.to_string()
                },
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(path, status = status.as_u16(), "api: response");
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let detail = ApiErrorBody::parse_message(&body);
        warn!(
            path,
            status = status.as_u16(),
            detail = detail.as_deref().unwrap_or(""),
            "api: non-success status"
        );
        Err(FetchError::Status {
            path: path.to_string(),
            status: status.as_u16(),
            detail,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        path: &str,
        response: Response,
    ) -> Result<T, FetchError> {
        response.json::<T>().await.map_err(|err| FetchError::Decode {
            path: path.to_string(),
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl DataFetcher for ApiClient {
    async fn get_collection(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Vec<Entity>, FetchError> {
        let mut request = self.http.get(self.url(path)?);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.send(path, request).await?;
        Self::decode(path, response).await
    }

    async fn get_record(&self, path: &str) -> Result<Entity, FetchError> {
        let response = self.send(path, self.http.get(self.url(path)?)).await?;
        Self::decode(path, response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Entity, FetchError> {
        let request = self.http.post(self.url(path)?).json(body);
        let response = self.send(path, request).await?;
        Self::decode(path, response).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
