//! Worksheet endpoints
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | GET | `/api/fmea` | list stored analyses |
//! | POST | `/api/fmea/:id` | save |
//! | GET | `/api/fmea/:id?raw=true` | load |
//! | DELETE | `/api/fmea/:id` | delete analysis |
//! | GET | `/api/fmea/:id/chains` | failure-chain groups |

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use fmea_common::chain::FmGroup;
use fmea_common::db::AnalysisSummary;
use fmea_common::orchestrator::{LoadOutcome, LoadRequest, SaveOutcome, SaveRequest};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn worksheet_routes() -> Router<AppState> {
    Router::new()
        .route("/api/fmea", get(list_analyses))
        .route(
            "/api/fmea/:id",
            get(load_analysis).post(save_analysis).delete(delete_analysis),
        )
        .route("/api/fmea/:id/chains", get(failure_chains))
}

/// GET /api/fmea
pub async fn list_analyses(State(state): State<AppState>) -> ApiResult<Json<Vec<AnalysisSummary>>> {
    Ok(Json(state.orchestrator.list().await?))
}

/// POST /api/fmea/:id
///
/// 200 committed (with rejection report), 409 rejected by the overwrite
/// guard (with score comparison), otherwise an error body by failure class.
pub async fn save_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SaveRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(mut request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    request.fmea_id = id;

    match state.orchestrator.save(request).await {
        outcome @ SaveOutcome::Committed(_) => Ok((StatusCode::OK, Json(outcome)).into_response()),
        outcome @ SaveOutcome::RejectedByGuard { .. } => {
            Ok((StatusCode::CONFLICT, Json(outcome)).into_response())
        }
        SaveOutcome::Failed { class, message, .. } => Err(ApiError::from_class(class, message)),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadQuery {
    #[serde(default)]
    pub raw: bool,
}

/// GET /api/fmea/:id
///
/// Legacy tree by default, the atomic batch with `?raw=true`.
pub async fn load_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LoadQuery>,
) -> ApiResult<Response> {
    let outcome = state
        .orchestrator
        .load(LoadRequest {
            fmea_id: id,
            raw: query.raw,
        })
        .await?;

    Ok(match outcome {
        LoadOutcome::Legacy(doc) => Json(doc).into_response(),
        LoadOutcome::Atomic(batch) => Json(batch).into_response(),
    })
}

/// DELETE /api/fmea/:id
pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.orchestrator.delete(&id).await? {
        info!("Deleted analysis {} via API", id.trim().to_uppercase());
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id.trim().to_uppercase()))
    }
}

/// GET /api/fmea/:id/chains
pub async fn failure_chains(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<FmGroup>>> {
    Ok(Json(state.orchestrator.failure_chains(&id).await?))
}
