use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    dto::{
        assignment_dto::AssignCollegesPayload,
        directory_dto::CreateCollegePayload,
        report_dto::StatisticsQuery,
        test_dto::{
            CreateTestPayload, CreatedTestResponse, GenerateSamplePayload, ListTestsQuery,
            QuestionDraftsResponse,
        },
    },
    error::{Error, Result},
    models::user::Actor,
    services::export_service::ExportService,
    utils::validation,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/master/tests",
    request_body = CreateTestPayload,
    responses(
        (status = 201, description = "Test created", body = Json<CreatedTestResponse>),
        (status = 400, description = "Validation failed"),
    )
)]
#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateTestPayload>,
) -> Result<impl IntoResponse> {
    let test = state.catalog_service.create_test(payload, &actor).await?;
    let response = CreatedTestResponse {
        id: test.id,
        name: test.name,
        total_marks: test.total_marks,
        question_count: test.question_count,
        created_at: test.created_at,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_tests(
    State(state): State<AppState>,
    Query(query): Query<ListTestsQuery>,
) -> Result<impl IntoResponse> {
    let tests = state.catalog_service.list_tests(query.is_active).await?;
    Ok(Json(tests))
}

pub async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state.catalog_service.get_test(id).await?;
    Ok(Json(test))
}

pub async fn deactivate_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state.catalog_service.deactivate_test(id).await?;
    Ok(Json(test))
}

#[utoipa::path(
    post,
    path = "/api/master/tests/{id}/colleges",
    request_body = AssignCollegesPayload,
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Assignments created", body = Json<serde_json::Value>),
        (status = 404, description = "Unknown test or college"),
    )
)]
#[axum::debug_handler]
pub async fn assign_colleges(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignCollegesPayload>,
) -> Result<impl IntoResponse> {
    validation::validate(&payload)?;
    let result = state
        .assignment_service
        .assign_to_colleges(&actor, id, &payload.college_ids)
        .await?;
    Ok(Json(result))
}

pub async fn list_test_assignments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let rows = state.assignment_service.list_for_test(id).await?;
    Ok(Json(rows))
}

pub async fn test_statistics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatisticsQuery>,
) -> Result<impl IntoResponse> {
    let stats = state.report_service.test_statistics(id, query.college_id).await?;
    Ok(Json(stats))
}

/// Per-student results of one test as XLSX.
pub async fn export_test_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (test, rows) = state.report_service.test_report(id).await?;
    let buffer = ExportService::generate_test_report_xlsx(&test, &rows)?;

    let filename = format!(
        "test_{}_{}.xlsx",
        test.name.replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
        state.clock.now().format("%Y%m%d")
    );
    let disposition = format!("attachment; filename=\"{}\"", filename);

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    ))
}

#[utoipa::path(
    post,
    path = "/api/master/questions/generate",
    request_body = GenerateSamplePayload,
    responses(
        (status = 200, description = "Question drafts", body = Json<serde_json::Value>),
        (status = 422, description = "Generator unavailable or returned nothing usable"),
    )
)]
pub async fn generate_questions(
    State(state): State<AppState>,
    Json(payload): Json<GenerateSamplePayload>,
) -> Result<impl IntoResponse> {
    validation::validate(&payload)?;
    let questions = state
        .question_source
        .generate_sample(payload.subject, payload.count)
        .await?;
    Ok(Json(QuestionDraftsResponse {
        count: questions.len(),
        questions,
    }))
}

/// Multipart upload with a `file` field holding a plain-text question paper.
pub async fn extract_questions(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut document = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            document = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = document.ok_or_else(|| Error::BadRequest("Missing 'file' field".to_string()))?;
    let questions = state.question_source.extract_from_document(&bytes)?;
    Ok(Json(QuestionDraftsResponse {
        count: questions.len(),
        questions,
    }))
}

pub async fn create_college(
    State(state): State<AppState>,
    Json(payload): Json<CreateCollegePayload>,
) -> Result<impl IntoResponse> {
    let college = state.directory_service.register_college(payload).await?;
    Ok((StatusCode::CREATED, Json(college)))
}
