use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use bytes::{Bytes, BytesMut};
use time::OffsetDateTime;
use tracing::{error, info, instrument};
use validator::Validate;

use crate::{
    applications::dto::MessageResponse,
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    resumes::{
        dto::{ResumeList, ResumeResponse, UpdateResumeRequest, Upload},
        repo::ResumeStore,
        repo_types::Resume,
        services::{attachment_filename, decode_pdf, from_upload, too_large},
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/resumes", get(list_resumes))
        .route("/resumes/:id", get(get_resume))
        .route("/resumes/:id/pdf", get(download_pdf))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/resumes",
            axum::routing::post(upload_resume).layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/resumes/:id",
            axum::routing::put(update_resume).delete(delete_resume),
        )
}

fn not_found() -> AppError {
    AppError::not_found("Resume not found")
}

#[instrument(skip(state))]
pub async fn list_resumes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ResumeList>> {
    let resumes = state.store.list_active_resumes(&user_id, None).await?;
    Ok(Json(ResumeList { resumes }))
}

#[instrument(skip(state))]
pub async fn get_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ResumeResponse>> {
    let resume = state
        .store
        .find_active_resume(&user_id, &id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ResumeResponse {
        resume: resume.without_pdf(),
    }))
}

/// POST /resumes (multipart): `pdf` file, optional `name` and `filename`.
#[instrument(skip(state, mp))]
pub async fn upload_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> AppResult<Json<ResumeResponse>> {
    let max = state.config.max_resume_bytes;
    let mut buf = BytesMut::new();
    let mut upload = Upload {
        bytes: Bytes::new(),
        content_type: None,
        file_name: None,
        name: None,
        filename: None,
    };

    while let Some(mut field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Malformed multipart body: {e}")))?
    {
        let part = field.name().map(str::to_string);
        match part.as_deref() {
            Some("pdf") => {
                upload.content_type = field.content_type().map(str::to_string);
                upload.file_name = field.file_name().map(str::to_string);
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::validation(format!("Malformed multipart body: {e}")))?
                {
                    buf.extend_from_slice(&chunk);
                    if buf.len() > max {
                        return Err(too_large(max));
                    }
                }
            }
            Some("name") => upload.name = field.text().await.ok(),
            Some("filename") => upload.filename = field.text().await.ok(),
            _ => {}
        }
    }

    upload.bytes = buf.freeze();
    let resume = from_upload(&user_id, upload, max, OffsetDateTime::now_utc())?;
    state.store.insert_resume(&resume).await?;
    info!(user_id = %user_id, id = %resume.id, size = resume.file_size, "resume uploaded");
    Ok(Json(ResumeResponse {
        resume: resume.without_pdf(),
    }))
}

#[instrument(skip(state, req))]
pub async fn update_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateResumeRequest>, AppError>,
) -> AppResult<Json<ResumeResponse>> {
    req.validate()?;
    let mut resume = state
        .store
        .find_active_resume(&user_id, &id)
        .await?
        .ok_or_else(not_found)?
        .without_pdf();
    req.apply_to(&mut resume, OffsetDateTime::now_utc());
    if !state.store.replace_resume(&resume).await? {
        return Err(not_found());
    }
    Ok(Json(ResumeResponse { resume }))
}

#[instrument(skip(state))]
pub async fn delete_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    if !state.store.delete_resume(&user_id, &id).await? {
        return Err(not_found());
    }
    info!(user_id = %user_id, id = %id, "resume deactivated");
    Ok(Json(MessageResponse {
        message: "Resume deleted successfully".into(),
    }))
}

#[instrument(skip(state))]
pub async fn download_pdf(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<(HeaderMap, Vec<u8>)> {
    let resume = state
        .store
        .find_active_resume(&user_id, &id)
        .await?
        .ok_or_else(not_found)?;
    let data = resume.pdf_data.as_deref().ok_or_else(not_found)?;
    let bytes = decode_pdf(data).map_err(|e| {
        error!(error = %e, user_id = %user_id, id = %id, "stored pdf is corrupt");
        AppError::Internal(e)
    })?;

    let disposition = format!("attachment; filename=\"{}\"", attachment_filename(&resume.filename));
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(Resume::PDF_MIME));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| AppError::Internal(e.into()))?,
    );
    Ok((headers, bytes))
}
