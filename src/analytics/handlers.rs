use axum::{extract::State, routing::get, Json, Router};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::{
    analytics::{dto::AnalyticsResponse, services},
    auth::extractors::AuthUser,
    error::AppResult,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/analytics", get(get_analytics))
}

#[instrument(skip(state))]
pub async fn get_analytics(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<AnalyticsResponse>> {
    let report = services::compute(state.store.as_ref(), &user_id, OffsetDateTime::now_utc()).await?;
    debug!(user_id = %user_id, total = report.overview.total_applications, "analytics computed");
    Ok(Json(report))
}
