use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    dto::{
        assignment_dto::{CollegeDecisionPayload, StudentFilters},
        directory_dto::CreateStudentPayload,
        report_dto::PerformanceQuery,
    },
    error::Result,
    models::user::Actor,
    AppState,
};

pub async fn list_assignments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse> {
    let rows = state.assignment_service.list_for_college(&actor).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    post,
    path = "/api/college/assignments/{id}/decision",
    request_body = CollegeDecisionPayload,
    params(
        ("id" = Uuid, Path, description = "College assignment ID")
    ),
    responses(
        (status = 200, description = "Decision recorded", body = Json<serde_json::Value>),
        (status = 403, description = "Assignment belongs to another college"),
        (status = 409, description = "Assignment already decided"),
    )
)]
#[axum::debug_handler]
pub async fn decide_assignment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CollegeDecisionPayload>,
) -> Result<impl IntoResponse> {
    let updated = state
        .assignment_service
        .set_college_status(&actor, id, payload.decision)
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    post,
    path = "/api/college/assignments/{id}/students",
    request_body = StudentFilters,
    params(
        ("id" = Uuid, Path, description = "College assignment ID")
    ),
    responses(
        (status = 200, description = "Students resolved", body = Json<serde_json::Value>),
        (status = 422, description = "No student matched"),
    )
)]
#[axum::debug_handler]
pub async fn assign_students(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(filters): Json<StudentFilters>,
) -> Result<impl IntoResponse> {
    let result = state
        .assignment_service
        .resolve_students(&actor, id, &filters)
        .await?;
    Ok(Json(result))
}

pub async fn create_student(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateStudentPayload>,
) -> Result<impl IntoResponse> {
    let student = state.directory_service.register_student(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn list_students(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse> {
    let students = state.directory_service.list_students(&actor).await?;
    Ok(Json(students))
}

pub async fn performance_report(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PerformanceQuery>,
) -> Result<impl IntoResponse> {
    let groups = state
        .report_service
        .college_performance(&actor, query.group_by)
        .await?;
    Ok(Json(groups))
}

/// Statistics for one test limited to the caller's college.
pub async fn test_statistics(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let college_id = actor.college_scope()?;
    let stats = state
        .report_service
        .test_statistics(id, Some(college_id))
        .await?;
    Ok(Json(stats))
}
