use aula_core::{LessonPlan, LessonPlanRequest};
use aula_llm::LlmProvider;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::error::ApiError;
use crate::server::AppState;

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    index_loaded: bool,
}

fn rejection_error(rejection: &JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            rejection.body_text(),
        );
    }
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "invalid_request",
        rejection.body_text(),
    )
}

pub(crate) async fn gerar_handler<P: LlmProvider + 'static>(
    State(state): State<AppState<P>>,
    payload: Result<Json<LessonPlanRequest>, JsonRejection>,
) -> Result<Json<LessonPlan>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        rejection_error(&rejection)
    })?;
    let plan = state.ctx.planner().plan_with_timeout(&request).await?;
    Ok(Json(plan))
}

pub(crate) async fn health_handler<P: LlmProvider + 'static>(
    State(state): State<AppState<P>>,
) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        index_loaded: state.ctx.index().is_loaded().await,
    })
}
