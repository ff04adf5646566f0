use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use crate::analysis::listing::{get_record, list_records};
use crate::analysis::pipeline::{Progress, SubmitInput};
use crate::errors::AppError;
use crate::models::feedback::AnalysisRecord;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<AnalysisRecord>,
}

/// POST /api/v1/resumes
/// Multipart form: `file` plus the free-text `company_name`, `job_title`,
/// `job_description` fields. Runs the full ingestion pipeline and returns the
/// finalized record.
pub async fn handle_submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AnalysisRecord>), AppError> {
    let mut document: Option<(Bytes, String)> = None;
    let mut company_name = String::new();
    let mut job_title = String::new();
    let mut job_description = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("resume.pdf").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read file: {e}")))?;
                document = Some((bytes, filename));
            }
            "company_name" => company_name = read_text(field).await?,
            "job_title" => job_title = read_text(field).await?,
            "job_description" => job_description = read_text(field).await?,
            _ => {} // unknown fields are ignored
        }
    }

    let (bytes, filename) =
        document.ok_or_else(|| AppError::BadRequest("missing 'file' field".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("uploaded file is empty".to_string()));
    }

    let input = SubmitInput {
        document: bytes,
        filename,
        company_name,
        job_title,
        job_description,
    };

    // Stage transitions are logged; the HTTP caller only sees the final result.
    let record = state.pipeline.submit(input, &Progress::disabled()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid text field: {e}")))
}

/// GET /api/v1/resumes
pub async fn handle_list(
    State(state): State<AppState>,
) -> Result<Json<ResumeListResponse>, AppError> {
    let resumes = list_records(state.records.as_ref()).await?;
    Ok(Json(ResumeListResponse { resumes }))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisRecord>, AppError> {
    let record = get_record(state.records.as_ref(), &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    Ok(Json(record))
}
