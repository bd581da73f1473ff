use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    dto::{assignment_dto::StudentTestsQuery, attempt_dto::SubmitAttemptPayload},
    error::Result,
    models::user::Actor,
    AppState,
};

pub async fn list_tests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<StudentTestsQuery>,
) -> Result<impl IntoResponse> {
    let tests = state.assignment_service.list_for_student(&actor, &query).await?;
    Ok(Json(tests))
}

pub async fn get_test(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.assignment_service.ensure_assigned(id, actor.id).await?;
    let test = state.catalog_service.get_public_test(id).await?;
    Ok(Json(test))
}

#[utoipa::path(
    post,
    path = "/api/student/tests/{id}/begin",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Questions without answer key", body = Json<serde_json::Value>),
        (status = 403, description = "Not assigned or outside the window"),
        (status = 409, description = "Already attempted"),
    )
)]
#[axum::debug_handler]
pub async fn begin_attempt(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let started = state.attempt_service.begin_attempt(id, actor.id).await?;
    Ok(Json(started))
}

#[utoipa::path(
    post,
    path = "/api/student/tests/{id}/submit",
    request_body = SubmitAttemptPayload,
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Scored submission", body = Json<serde_json::Value>),
        (status = 400, description = "Malformed answers"),
        (status = 403, description = "Not assigned or outside the window"),
        (status = 409, description = "Already attempted"),
    )
)]
#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAttemptPayload>,
) -> Result<impl IntoResponse> {
    let result = state
        .attempt_service
        .submit_attempt(id, actor.id, payload)
        .await?;
    Ok(Json(result))
}

pub async fn get_results(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let results = state.attempt_service.get_results(id, actor.id).await?;
    Ok(Json(results))
}

pub async fn attempt_history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse> {
    let items = state.attempt_service.history(actor.id).await?;
    Ok(Json(items))
}
