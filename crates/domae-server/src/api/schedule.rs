use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;

use domae_sync::{JobScheduleInfo, SyncError};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct TriggerData {
    job_id: String,
    status: &'static str,
}

pub(super) async fn get_schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<JobScheduleInfo>>> {
    let data = state.scheduler.get_schedule_info().await;
    Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn trigger_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<TriggerData>>, ApiError> {
    match state.scheduler.trigger_job(&job_id) {
        Ok(()) => Ok(Json(ApiResponse {
            data: TriggerData {
                job_id,
                status: "started",
            },
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(SyncError::UnknownJob { job_id }) => Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("no scheduled job named {job_id}"),
        )),
        Err(err) => {
            tracing::error!(error = %err, "manual trigger failed");
            Err(ApiError::new(
                req_id.0,
                "internal_error",
                "failed to trigger job",
            ))
        }
    }
}
