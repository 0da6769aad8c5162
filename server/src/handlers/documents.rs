//! Document handlers.
//!
//! The server stores what it is given. Merging happens on the client, which
//! reads the current document, merges its pending patch over it and writes
//! the result back as a full replacement.

use crate::db;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tether_engine::{Document, Identity, MergeSchema};

/// Response for `GET /documents/{identity}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub identity: String,
    pub document: Document,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `PUT /documents/{identity}`.
#[derive(Debug, Deserialize)]
pub struct PutDocumentRequest {
    pub document: Document,
}

/// Response for `PUT /documents/{identity}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutDocumentResponse {
    pub identity: String,
    pub updated_at: DateTime<Utc>,
}

/// Resolve a path segment to a user ID. Guest data never leaves the device.
pub fn user_id(raw: &str) -> Result<String> {
    match Identity::parse(Some(raw)) {
        Identity::User(id) => Ok(id),
        Identity::Guest => Err(AppError::BadRequest(
            "guest documents are not stored remotely".to_string(),
        )),
    }
}

/// Check a full document against the schema before it is stored.
pub fn validate_document(schema: &MergeSchema, document: &Document) -> Result<()> {
    schema.validate_patch(document)?;
    Ok(())
}

/// Fetch the stored document for an identity.
pub async fn handle_get(pool: &PgPool, identity: &str) -> Result<DocumentResponse> {
    let user_id = user_id(identity)?;

    let stored = db::get_document(pool, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no document for '{}'", user_id)))?;

    Ok(DocumentResponse {
        document: stored.document(),
        identity: stored.identity,
        updated_at: stored.updated_at,
    })
}

/// Replace the stored document for an identity.
pub async fn handle_put(
    pool: &PgPool,
    schema: &MergeSchema,
    identity: &str,
    request: PutDocumentRequest,
) -> Result<PutDocumentResponse> {
    let user_id = user_id(identity)?;
    validate_document(schema, &request.document)?;

    let updated_at = db::upsert_document(pool, &user_id, &request.document).await?;
    tracing::debug!(
        identity = %user_id,
        fields = request.document.len(),
        "Stored document"
    );

    Ok(PutDocumentResponse {
        identity: user_id,
        updated_at,
    })
}
