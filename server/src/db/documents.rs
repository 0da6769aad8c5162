//! Queries against the `documents` table.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tether_engine::Document;

/// A row of the `documents` table.
#[derive(Debug)]
pub struct StoredDocument {
    pub identity: String,
    pub body: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredDocument {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredDocument {
            identity: row.try_get("identity")?,
            body: row.try_get("body")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredDocument {
    /// The stored body as a document. Anything other than an object reads as empty.
    pub fn document(&self) -> Document {
        match &self.body {
            serde_json::Value::Object(map) => map.clone(),
            _ => Document::new(),
        }
    }
}

/// Fetch the document stored for `identity`.
pub async fn get_document(
    pool: &PgPool,
    identity: &str,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(
        r#"
        SELECT identity, body, updated_at
        FROM documents
        WHERE identity = $1
        "#,
    )
    .bind(identity)
    .fetch_optional(pool)
    .await
}

/// Replace (or create) the document for `identity`. Returns the new `updated_at`.
pub async fn upsert_document(
    pool: &PgPool,
    identity: &str,
    document: &Document,
) -> Result<DateTime<Utc>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO documents (identity, body, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (identity) DO UPDATE SET
            body = EXCLUDED.body,
            updated_at = EXCLUDED.updated_at
        RETURNING updated_at
        "#,
    )
    .bind(identity)
    .bind(sqlx::types::Json(document))
    .fetch_one(pool)
    .await?;

    row.try_get("updated_at")
}
