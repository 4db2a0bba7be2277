//! HTTP client for the RAG backend.
//!
//! Defines the [`Backend`] trait (the seam every orchestration module is
//! written against) and [`HttpBackend`], the reqwest implementation of the
//! four endpoints docchat consumes:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET`  | `/collection/list?page=&size=` | One page of collection metadata |
//! | `GET`  | `/collection/{id}?with_documents=true` | Document names of one collection |
//! | `POST` | `/document/upload` | Multipart upload (`collection`, `file`) |
//! | `POST` | `/chat` | Ask a question, get an answer and citations |
//!
//! Every call is a single attempt. Failures are returned as a typed
//! [`BackendError`] so callers can log the cause; the user-facing fail-soft
//! policy is applied one level up in [`collections`](crate::collections) and
//! [`chat`](crate::chat).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::models::{ChatRequest, CollectionDetail, CollectionListPage};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend base path is not configured")]
    NotConfigured,

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl BackendError {
    /// HTTP status code for [`BackendError::Status`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The operations docchat needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch one page (1-based) of the collection list.
    async fn collection_page(&self, page: u32) -> Result<CollectionListPage, BackendError>;

    /// Fetch a collection with its document names.
    async fn collection_documents(&self, id: &str) -> Result<CollectionDetail, BackendError>;

    /// Upload a file into the named collection. Only HTTP 200 counts as success.
    async fn upload_document(
        &self,
        collection: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BackendError>;

    /// Send a chat request; returns the raw JSON body of a 200 response.
    async fn chat(&self, request: &ChatRequest) -> Result<serde_json::Value, BackendError>;
}

/// [`Backend`] implementation over reqwest.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Option<String>,
    page_size: u32,
    list_timeout: Duration,
    chat_timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let base = config
            .base_path
            .as_deref()
            .map(|b| b.trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());

        Ok(Self {
            client,
            base,
            page_size: config.page_size,
            list_timeout: Duration::from_secs(config.list_timeout_secs),
            chat_timeout: config.chat_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn url(&self, path: &str) -> Result<String, BackendError> {
        let base = self.base.as_deref().ok_or(BackendError::NotConfigured)?;
        Ok(format!("{}{}", base, path))
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let response = request.send().await.map_err(|e| BackendError::Transport {
            endpoint: endpoint.to_string(),
            source: e,
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport {
                endpoint: endpoint.to_string(),
                source: e,
            })?;
        serde_json::from_slice(&body).map_err(|e| BackendError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn collection_page(&self, page: u32) -> Result<CollectionListPage, BackendError> {
        let endpoint = "/collection/list";
        let url = self.url(endpoint)?;
        tracing::debug!(page, size = self.page_size, "fetching collection page");

        let request = self
            .client
            .get(url)
            .query(&[("page", page), ("size", self.page_size)])
            .timeout(self.list_timeout);
        let response = self.send(endpoint, request).await?;
        Self::read_json(endpoint, response).await
    }

    async fn collection_documents(&self, id: &str) -> Result<CollectionDetail, BackendError> {
        let endpoint = format!("/collection/{}", id);
        let url = self.url(&endpoint)?;

        let request = self
            .client
            .get(url)
            .query(&[("with_documents", "true")])
            .timeout(self.list_timeout);
        let response = self.send(&endpoint, request).await?;
        Self::read_json(&endpoint, response).await
    }

    async fn upload_document(
        &self,
        collection: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BackendError> {
        let endpoint = "/document/upload";
        let url = self.url(endpoint)?;
        tracing::info!(collection, file_name, bytes = bytes.len(), "uploading document");

        let form = reqwest::multipart::Form::new()
            .text("collection", collection.to_string())
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string()),
            );

        self.send(endpoint, self.client.post(url).multipart(form))
            .await?;
        Ok(())
    }

    async fn chat(&self, request: &ChatRequest) -> Result<serde_json::Value, BackendError> {
        let endpoint = "/chat";
        let url = self.url(endpoint)?;

        let mut builder = self.client.post(url).json(request);
        if let Some(timeout) = self.chat_timeout {
            builder = builder.timeout(timeout);
        }
        let response = self.send(endpoint, builder).await?;
        Self::read_json(endpoint, response).await
    }
}
