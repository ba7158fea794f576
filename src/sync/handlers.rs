use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
    sync::{
        dto::{PullQuery, PullResponse, PushRequest, PushResponse, StatusResponse},
        services,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync/pull", get(pull))
        .route("/sync/push", post(push))
        .route("/sync/status", get(status))
}

#[instrument(skip(state))]
pub async fn pull(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Query(q), _): WithRejection<Query<PullQuery>, AppError>,
) -> AppResult<Json<PullResponse>> {
    let since = services::parse_since(q.last_sync.as_deref())?;
    let res = services::pull(state.store.as_ref(), &user_id, since, OffsetDateTime::now_utc()).await?;
    info!(
        user_id = %user_id,
        applications = res.data.applications.len(),
        resumes = res.data.resumes.len(),
        "sync pull"
    );
    Ok(Json(res))
}

#[instrument(skip(state, req))]
pub async fn push(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<PushRequest>, AppError>,
) -> AppResult<Json<PushResponse>> {
    let res = services::push(state.store.as_ref(), &user_id, req, OffsetDateTime::now_utc()).await;
    let r = &res.results;
    info!(
        user_id = %user_id,
        apps_created = r.applications.created,
        apps_updated = r.applications.updated,
        apps_conflicts = r.applications.conflicts.len(),
        resumes_created = r.resumes.created,
        resumes_updated = r.resumes.updated,
        resumes_conflicts = r.resumes.conflicts.len(),
        "sync push"
    );
    Ok(Json(res))
}

#[instrument(skip(state))]
pub async fn status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<StatusResponse>> {
    let status = services::status(state.store.as_ref(), &user_id, OffsetDateTime::now_utc()).await?;
    Ok(Json(StatusResponse {
        success: true,
        status,
    }))
}
