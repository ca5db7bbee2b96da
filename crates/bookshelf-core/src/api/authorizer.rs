//! Credential attachment for outbound data requests.
//!
//! Every data call goes through [`RequestAuthorizer::send`], which makes sure
//! a held token is fresh, attaches it as a bearer credential, and maps
//! rejected credentials to [`ApiError::Unauthorized`]. Call sites never see
//! tokens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::SessionManager;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

// ============================================================================
// Request / Response
// ============================================================================

/// What to call, without any credential.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn with_body<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Unserializable request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Add a query parameter, skipping empty values
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.query.push((key.to_string(), value.to_string()));
        }
        self
    }
}

/// A descriptor paired with the credential it will be sent with.
/// Lives only for the duration of one dispatch.
#[derive(Debug, Clone)]
pub struct AuthorizedRequest {
    pub descriptor: RequestDescriptor,
    pub bearer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Carries an authorized request to the server. Status codes are returned
/// as-is; interpreting them is the authorizer's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &AuthorizedRequest) -> Result<ApiResponse, ApiError>;
}

/// Transport over `reqwest`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &AuthorizedRequest) -> Result<ApiResponse, ApiError> {
        let descriptor = &request.descriptor;
        let url = format!("{}{}", self.base_url, descriptor.path);

        let mut builder = self
            .client
            .request(descriptor.method.clone(), &url)
            .query(&descriptor.query);
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = descriptor.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}

// ============================================================================
// Authorizer
// ============================================================================

pub struct RequestAuthorizer {
    sessions: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
    refresh_threshold_secs: i64,
    initial_backoff: Duration,
}

impl RequestAuthorizer {
    pub fn new(
        sessions: Arc<SessionManager>,
        transport: Arc<dyn Transport>,
        refresh_threshold_secs: i64,
    ) -> Self {
        Self {
            sessions,
            transport,
            refresh_threshold_secs,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Attach a fresh credential when a session exists. A failed refresh
    /// aborts the request instead of sending it without a token.
    async fn authorize(&self, descriptor: RequestDescriptor) -> Result<AuthorizedRequest, ApiError> {
        let bearer = if self.sessions.token().is_some() {
            Some(self.sessions.ensure_fresh_token(self.refresh_threshold_secs).await?)
        } else {
            None
        };

        Ok(AuthorizedRequest { descriptor, bearer })
    }

    /// Send a request, returning the successful response.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<ApiResponse, ApiError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let request = self.authorize(descriptor.clone()).await?;
            debug!(
                method = %request.descriptor.method,
                path = %request.descriptor.path,
                authenticated = request.bearer.is_some(),
                "Dispatching request"
            );

            let response = self.transport.execute(&request).await?;

            if response.status.is_success() {
                return Ok(response);
            }

            if response.status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(
                    path = %descriptor.path,
                    retry = retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2; // Exponential backoff
                continue;
            }

            let err = ApiError::from_status(response.status, &response.body);
            if err.needs_reauthentication() {
                warn!(path = %descriptor.path, status = response.status.as_u16(), "Credential rejected by server");
            }
            return Err(err);
        }
    }

    /// Send a request and decode its JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<T, ApiError> {
        self.send(descriptor).await?.json()
    }
}
