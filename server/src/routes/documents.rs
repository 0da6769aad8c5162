//! Document routes.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::error::Result;
use crate::handlers::{
    handle_get, handle_put, DocumentResponse, PutDocumentRequest, PutDocumentResponse,
};
use crate::AppState;

/// Create document routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/documents/{identity}",
        get(get_handler).put(put_handler),
    )
}

/// GET /documents/{identity} - Fetch the stored document.
async fn get_handler(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<DocumentResponse>> {
    let response = handle_get(&state.pool, &identity).await?;
    Ok(Json(response))
}

/// PUT /documents/{identity} - Replace the stored document.
async fn put_handler(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    Json(request): Json<PutDocumentRequest>,
) -> Result<Json<PutDocumentResponse>> {
    let response = handle_put(&state.pool, &state.schema, &identity, request).await?;
    Ok(Json(response))
}
