use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct BatchesQuery {
    pub source: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct BatchItem {
    batch_id: String,
    source: String,
    collection_type: String,
    keyword: Option<String>,
    status: String,
    total_found: i32,
    total_collected: i32,
    successful_collections: i32,
    failed_collections: i32,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<domae_db::CollectionBatchRow> for BatchItem {
    fn from(row: domae_db::CollectionBatchRow) -> Self {
        Self {
            batch_id: row.batch_id,
            source: row.source,
            collection_type: row.collection_type,
            keyword: row.keyword,
            status: row.status,
            total_found: row.total_found,
            total_collected: row.total_collected,
            successful_collections: row.successful_collections,
            failed_collections: row.failed_collections,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_batches(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<BatchesQuery>,
) -> Result<Json<ApiResponse<Vec<BatchItem>>>, ApiError> {
    let rows = domae_db::list_recent_batches(
        &state.pool,
        query.source.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(BatchItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(batch_id): Path<String>,
) -> Result<Json<ApiResponse<BatchItem>>, ApiError> {
    let row = domae_db::get_batch(&state.pool, &batch_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no collection batch with id {batch_id}"),
            )
        })?;

    Ok(Json(ApiResponse {
        data: BatchItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}
