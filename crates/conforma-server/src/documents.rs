//! Document management routes.
//!
//! Callers submit already-extracted text; file parsing happens upstream.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use conforma_core::Partition;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct PartitionQuery {
    pub partition: Partition,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<String>,
    pub partition: Partition,
}

#[derive(Debug, Deserialize)]
pub struct UpsertRequest {
    pub id: String,
    pub partition: Partition,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct UpsertResponse {
    pub success: bool,
    pub doc_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub doc_id: String,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PartitionQuery>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let documents = state
        .ctx
        .store
        .list_documents(query.partition)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(DocumentListResponse {
        documents,
        partition: query.partition,
    }))
}

pub async fn upsert(
    State(state): State<AppState>,
    Json(request): Json<UpsertRequest>,
) -> Result<Json<UpsertResponse>, ApiError> {
    if request.id.trim().is_empty() {
        return Err(ApiError::bad_request("document id must not be empty"));
    }
    state
        .ctx
        .store
        .upsert(
            request.partition,
            &request.id,
            &request.text,
            request.metadata,
        )
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    info!(doc_id = %request.id, partition = %request.partition, "document upserted");
    Ok(Json(UpsertResponse {
        success: true,
        doc_id: request.id,
    }))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Query(query): Query<PartitionQuery>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state
        .ctx
        .store
        .delete(query.partition, &doc_id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    info!(doc_id = %doc_id, partition = %query.partition, "document deleted");
    Ok(Json(DeleteResponse {
        success: true,
        doc_id,
    }))
}
