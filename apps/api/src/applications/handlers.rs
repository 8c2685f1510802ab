use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::applications::service::ListQuery;
use crate::errors::{AppError, AppJson};
use crate::models::application::{
    Communication, CreateCommunicationRequest, CreateJobApplicationRequest, CreateNoteRequest,
    DeleteJobApplicationResponse, JobApplication, JobApplicationListResponse, Note,
    UpdateJobApplicationRequest,
};
use crate::state::AppState;

/// GET /api/job-applications
pub async fn handle_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<JobApplicationListResponse> {
    Json(state.applications.search(&query).await)
}

/// POST /api/job-applications
pub async fn handle_create(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateJobApplicationRequest>,
) -> Result<(StatusCode, Json<JobApplication>), AppError> {
    let created = state.applications.create(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/job-applications/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobApplication>, AppError> {
    Ok(Json(state.applications.get_by_id(&id).await?))
}

/// PATCH /api/job-applications/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateJobApplicationRequest>,
) -> Result<Json<JobApplication>, AppError> {
    Ok(Json(state.applications.update(&id, req).await?))
}

/// DELETE /api/job-applications/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteJobApplicationResponse>, AppError> {
    let deleted = state.applications.delete(&id).await?;
    Ok(Json(DeleteJobApplicationResponse {
        success: true,
        message: "Job application deleted successfully".to_string(),
        deleted_job_application: deleted,
    }))
}

/// POST /api/job-applications/:id/notes
pub async fn handle_add_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let note = state.applications.append_note(&id, req).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// POST /api/job-applications/:id/communications
pub async fn handle_add_communication(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<CreateCommunicationRequest>,
) -> Result<(StatusCode, Json<Communication>), AppError> {
    let communication = state.applications.append_communication(&id, req).await?;
    Ok((StatusCode::CREATED, Json(communication)))
}
