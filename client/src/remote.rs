//! Authoritative per-identity document storage.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tether_engine::Document;

use crate::error::RemoteError;

/// Remote document store.
///
/// `write_merge` replaces the stored document wholesale; callers merge
/// before writing.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the document for `user_id`. `Ok(None)` means no document exists.
    async fn read(&self, user_id: &str) -> Result<Option<Document>, RemoteError>;

    /// Replace the document for `user_id`.
    async fn write_merge(&self, user_id: &str, document: &Document) -> Result<(), RemoteError>;
}

/// Response body of `GET /documents/{identity}`.
#[derive(Debug, Deserialize)]
struct DocumentResponse {
    document: Document,
}

/// Request body of `PUT /documents/{identity}`.
#[derive(Debug, Serialize)]
struct PutDocumentRequest<'a> {
    document: &'a Document,
}

/// Remote store backed by a `tether-server` instance.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Unavailable(format!("invalid base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Unavailable(format!(
                "invalid base URL: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// URL of the document resource for `user_id`, with the ID percent-encoded
    /// as a single path segment.
    pub fn document_url(&self, user_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("documents").push(user_id);
        }
        url
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn read(&self, user_id: &str) -> Result<Option<Document>, RemoteError> {
        let response = self.client.get(self.document_url(user_id)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: DocumentResponse = response
                    .json()
                    .await
                    .map_err(|e| RemoteError::Decode(e.to_string()))?;
                Ok(Some(body.document))
            }
            status => Err(RemoteError::Status(status.as_u16())),
        }
    }

    async fn write_merge(&self, user_id: &str, document: &Document) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.document_url(user_id))
            .json(&PutDocumentRequest { document })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteError::Status(status.as_u16()))
        }
    }
}

/// In-process remote store for tests and offline demos.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    documents: DashMap<String, Document>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a document directly.
    pub fn insert(&self, user_id: impl Into<String>, document: Document) {
        self.documents.insert(user_id.into(), document);
    }

    /// Current document for `user_id`, bypassing the async interface.
    pub fn get(&self, user_id: &str) -> Option<Document> {
        self.documents.get(user_id).map(|d| d.value().clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn read(&self, user_id: &str) -> Result<Option<Document>, RemoteError> {
        Ok(self.get(user_id))
    }

    async fn write_merge(&self, user_id: &str, document: &Document) -> Result<(), RemoteError> {
        self.insert(user_id, document.clone());
        Ok(())
    }
}
