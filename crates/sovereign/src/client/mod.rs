//! HTTP client for the assistant backend.
//!
//! Provides `AssistantClient`, which posts a query to `/chat` and hands back
//! the raw response body as a byte stream. Decoding the stream is the
//! session controller's job; the client only distinguishes "rejected
//! credential" from "here is a body" from "something went wrong".

mod error;

pub use error::{ClientError, Result};

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// A response body, chunk by chunk, as it arrives.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Outcome of opening a chat request.
pub enum ChatResponse {
    /// The backend rejected the credential (HTTP 401).
    Unauthorized,
    /// The backend accepted the request; the body streams events.
    Streaming(ByteStream),
}

impl fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => f.write_str("Unauthorized"),
            Self::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// The seam between the session controller and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `query` with `api_key` as bearer credential.
    async fn open_chat(&self, query: &str, api_key: &str) -> Result<ChatResponse>;
}

/// Body of `POST /chat`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub query: &'a str,
}

/// Response from the `/health` endpoint.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// HTTP client for the assistant backend.
#[derive(Debug, Clone)]
pub struct AssistantClient {
    base_url: String,
    http: Client,
}

impl AssistantClient {
    /// Create a new client pointing to the given base URL.
    ///
    /// Example: `AssistantClient::new("http://localhost:8000")`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the backend is up.
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::ServerUnhealthy {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    /// Post a query and return the streaming body.
    ///
    /// 401 is reported as [`ChatResponse::Unauthorized`]; every other
    /// non-success status is an error.
    pub async fn chat(&self, query: &str, api_key: &str) -> Result<ChatResponse> {
        let url = format!("{}/chat", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&ChatRequest { query })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(ChatResponse::Unauthorized);
        }
        if !status.is_success() {
            return Err(self.parse_error(response).await);
        }

        let body = response.bytes_stream().map_err(ClientError::Http);
        Ok(ChatResponse::Streaming(Box::pin(body)))
    }

    /// Parse an error response into a ClientError.
    async fn parse_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();

        let message = match response.json::<ErrorDetail>().await {
            Ok(ErrorDetail {
                detail: Some(serde_json::Value::String(detail)),
            }) => detail,
            Ok(ErrorDetail {
                detail: Some(other),
            }) => other.to_string(),
            _ => format!("HTTP {}", status),
        };

        ClientError::ApiError { status, message }
    }
}

#[async_trait]
impl Transport for AssistantClient {
    async fn open_chat(&self, query: &str, api_key: &str) -> Result<ChatResponse> {
        self.chat(query, api_key).await
    }
}

/// Error body in the backend's `{"detail": ...}` shape.
#[derive(Deserialize)]
struct ErrorDetail {
    detail: Option<serde_json::Value>,
}
