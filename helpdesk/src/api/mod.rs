//! HTTP client for the Help Desk backend
//!
//! Thin JSON-over-HTTP layer: builds URLs from the configured base,
//! attaches the bearer token, and maps non-success statuses onto
//! [`AppError`] variants. No retries, deduplication or cancellation.

use crate::config::ClientConfig;
use crate::error::{AppError, Result};
use crate::models::{
    Comment, CommentDraft, Credentials, DashboardStats, Resource, Session, TicketHistory,
    UserFavFilter,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Metadata of an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    file_name: &'a str,
    mime_type: &'a str,
    /// Base64-encoded file bytes
    content: String,
}

#[derive(Serialize)]
struct PageAccessRequest<'a> {
    role_id: i64,
    path: &'a str,
}

#[derive(Deserialize)]
struct PageAccessResponse {
    has_access: bool,
}

#[derive(Serialize)]
struct FavoriteRequest {
    filter_id: i64,
}

/// Error body shapes the backend uses
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the backend REST API
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, timeout, None)
    }

    /// Client for `config`, routed through its proxy when one is set
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::build(
            &config.api_base_url,
            config.request_timeout,
            config.proxy_target.as_deref(),
        )
    }

    fn build(base_url: &str, timeout: Duration, proxy: Option<&str>) -> Result<Self> {
        url::Url::parse(base_url)?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("helpdesk-mefasa/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout);

        if let Some(proxy) = proxy {
            tracing::debug!("Routing backend requests through {}", proxy);
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token sent with every request
    pub fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut slot) => *slot = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn has_token(&self) -> bool {
        self.current_token().is_some()
    }

    fn current_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.current_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-success response into an error
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.message.or(body.error))
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                } else {
                    text.trim().to_string()
                }
            });

        tracing::warn!("Request failed with status {}: {}", status, message);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            _ => AppError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    // ===== Authentication =====

    /// Exchange credentials for a session.
    ///
    /// Any rejection by the backend becomes [`AppError::InvalidCredentials`];
    /// only transport failures keep their own error.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        tracing::debug!("POST /auth/login");

        let response = self
            .http
            .post(self.url("auth/login"))
            .json(credentials)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::info!("Login rejected with status {}", response.status());
            return Err(AppError::InvalidCredentials);
        }

        response
            .json::<Session>()
            .await
            .map_err(|_| AppError::InvalidCredentials)
    }

    /// Ask the backend whether a role may open a page
    pub async fn check_page_access(&self, role_id: i64, path: &str) -> Result<bool> {
        let response: PageAccessResponse = self
            .send_json(
                self.request(Method::POST, "permissions/check")
                    .json(&PageAccessRequest { role_id, path }),
            )
            .await?;
        Ok(response.has_access)
    }

    // ===== Generic collections =====

    pub async fn list<R: Resource>(&self) -> Result<Vec<R>> {
        let path = R::KIND.collection();
        tracing::debug!("GET /{}", path);
        self.send_json(self.request(Method::GET, path)).await
    }

    pub async fn get<R: Resource>(&self, id: i64) -> Result<R> {
        let path = format!("{}/{}", R::KIND.collection(), id);
        tracing::debug!("GET /{}", path);
        self.send_json(self.request(Method::GET, &path)).await
    }

    pub async fn create<R: Resource>(&self, draft: &R::Draft) -> Result<R> {
        let path = R::KIND.collection();
        tracing::debug!("POST /{}", path);
        self.send_json(self.request(Method::POST, path).json(draft))
            .await
    }

    pub async fn update<R: Resource>(&self, id: i64, draft: &R::Draft) -> Result<R> {
        let path = format!("{}/{}", R::KIND.collection(), id);
        tracing::debug!("PUT /{}", path);
        self.send_json(self.request(Method::PUT, &path).json(draft))
            .await
    }

    pub async fn delete<R: Resource>(&self, id: i64) -> Result<()> {
        let path = format!("{}/{}", R::KIND.collection(), id);
        tracing::debug!("DELETE /{}", path);
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    // ===== Ticket details =====

    pub async fn ticket_history(&self, ticket_id: i64) -> Result<Vec<TicketHistory>> {
        self.send_json(self.request(Method::GET, &format!("tickets/{}/history", ticket_id)))
            .await
    }

    pub async fn ticket_comments(&self, ticket_id: i64) -> Result<Vec<Comment>> {
        self.send_json(self.request(Method::GET, &format!("tickets/{}/comments", ticket_id)))
            .await
    }

    pub async fn add_comment(&self, ticket_id: i64, draft: &CommentDraft) -> Result<Comment> {
        self.send_json(
            self.request(Method::POST, &format!("tickets/{}/comments", ticket_id))
                .json(draft),
        )
        .await
    }

    // ===== Favorites =====

    pub async fn favorite_filters(&self) -> Result<Vec<UserFavFilter>> {
        self.send_json(self.request(Method::GET, "filters/favorites"))
            .await
    }

    pub async fn add_favorite(&self, filter_id: i64) -> Result<UserFavFilter> {
        self.send_json(
            self.request(Method::POST, "filters/favorites")
                .json(&FavoriteRequest { filter_id }),
        )
        .await
    }

    pub async fn remove_favorite(&self, filter_id: i64) -> Result<()> {
        self.send_empty(self.request(Method::DELETE, &format!("filters/favorites/{}", filter_id)))
            .await
    }

    // ===== Dashboard =====

    pub async fn dashboard(&self, days: u32) -> Result<DashboardStats> {
        self.send_json(
            self.request(Method::GET, "dashboard")
                .query(&[("days", days)]),
        )
        .await
    }

    // ===== Files =====

    pub async fn upload_file(&self, file_name: &str, mime_type: &str, data: &[u8]) -> Result<UploadedFile> {
        tracing::debug!("Uploading {} ({} bytes)", file_name, data.len());

        let body = UploadRequest {
            file_name,
            mime_type,
            content: BASE64.encode(data),
        };
        self.send_json(self.request(Method::POST, "files/upload").json(&body))
            .await
    }

    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let response = Self::check(
            self.request(Method::GET, &format!("files/{}", file_id))
                .send()
                .await?,
        )
        .await?;
        Ok(response.bytes().await?.to_vec())
    }
}
