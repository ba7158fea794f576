use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use time::OffsetDateTime;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    applications::{
        dto::{
            ApplicationList, ApplicationResponse, BatchRequest, BatchResponse, CreateApplicationRequest,
            ListQuery, MessageResponse, SearchEcho, SearchQuery, SearchResponse, UpdateApplicationRequest,
        },
        query::{ApplicationFilter, ApplicationQuery, SortField, SortOrder, TextQuery, TextScope},
        repo::ApplicationStore,
        services,
    },
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/applications", get(list_applications))
        .route("/applications/:id", get(get_application))
        .route("/search", get(search_applications))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/applications", post(create_application))
        .route("/applications/batch", post(batch_applications))
        .route(
            "/applications/:id",
            axum::routing::put(update_application).delete(delete_application),
        )
}

async fn page(state: &AppState, user_id: &str, query: ApplicationQuery) -> AppResult<ApplicationList> {
    let (applications, total) = tokio::try_join!(
        state.store.list_applications(user_id, &query),
        state.store.count_applications(user_id, &query.filter),
    )?;
    let has_more = query.offset + (applications.len() as i64) < total;
    Ok(ApplicationList {
        applications,
        total,
        has_more,
    })
}

#[instrument(skip(state))]
pub async fn list_applications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Query(q), _): WithRejection<Query<ListQuery>, AppError>,
) -> AppResult<Json<ApplicationList>> {
    let filter = ApplicationFilter {
        statuses: q.status.into_iter().collect(),
        tags_any: q.tags(),
        text: q.company.clone().map(|needle| TextQuery {
            needle,
            scope: TextScope::CompanyOrTitle,
        }),
        ..ApplicationFilter::default()
    };
    let query = ApplicationQuery {
        filter,
        sort: q.sort_by,
        order: q.order,
        limit: q.limit.max(0),
        offset: q.offset.max(0),
    };
    Ok(Json(page(&state, &user_id, query).await?))
}

#[instrument(skip(state))]
pub async fn search_applications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Query(q), _): WithRejection<Query<SearchQuery>, AppError>,
) -> AppResult<Json<SearchResponse>> {
    let tags = q.tags();
    let filter = ApplicationFilter {
        statuses: q.status.into_iter().collect(),
        tags_any: tags.clone(),
        text: q.q.clone().filter(|s| !s.is_empty()).map(|needle| TextQuery {
            needle,
            scope: TextScope::Everything,
        }),
        company: q.company.clone(),
        applied_from: q.date_from,
        applied_to: q.date_to,
        ..ApplicationFilter::default()
    };
    let query = ApplicationQuery {
        filter,
        sort: SortField::DateApplied,
        order: SortOrder::Desc,
        limit: q.limit.max(0),
        offset: q.offset.max(0),
    };
    let list = page(&state, &user_id, query).await?;
    Ok(Json(SearchResponse {
        list,
        query: SearchEcho {
            search_term: q.q,
            status: q.status,
            tags: (!tags.is_empty()).then_some(tags),
            date_from: q.date_from,
            date_to: q.date_to,
            company_name: q.company,
        },
    }))
}

#[instrument(skip(state, req))]
pub async fn create_application(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<CreateApplicationRequest>, AppError>,
) -> AppResult<Json<ApplicationResponse>> {
    req.validate()?;
    let application = services::new_manual(&user_id, req, OffsetDateTime::now_utc())?;
    state.store.insert_application(&application).await?;
    info!(user_id = %user_id, id = %application.id, "application created");
    Ok(Json(ApplicationResponse { application }))
}

#[instrument(skip(state))]
pub async fn get_application(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApplicationResponse>> {
    let application = state
        .store
        .find_application(&user_id, &id)
        .await?
        .ok_or_else(|| AppError::not_found("Application not found"))?;
    Ok(Json(ApplicationResponse { application }))
}

#[instrument(skip(state, req))]
pub async fn update_application(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateApplicationRequest>, AppError>,
) -> AppResult<Json<ApplicationResponse>> {
    req.validate()?;
    let application = services::update(
        state.store.as_ref(),
        &user_id,
        &id,
        req.into(),
        OffsetDateTime::now_utc(),
    )
    .await?
    .ok_or_else(|| AppError::not_found("Application not found"))?;
    info!(user_id = %user_id, id = %id, status = %application.status, "application updated");
    Ok(Json(ApplicationResponse { application }))
}

#[instrument(skip(state))]
pub async fn delete_application(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    if !state.store.delete_application(&user_id, &id).await? {
        return Err(AppError::not_found("Application not found"));
    }
    info!(user_id = %user_id, id = %id, "application deleted");
    Ok(Json(MessageResponse {
        message: "Application deleted successfully".into(),
    }))
}

#[instrument(skip(state, req))]
pub async fn batch_applications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<BatchRequest>, AppError>,
) -> AppResult<Json<BatchResponse>> {
    let res = services::batch_upsert(
        state.store.as_ref(),
        &user_id,
        req.applications,
        OffsetDateTime::now_utc(),
    )
    .await?;
    info!(user_id = %user_id, ok = res.success, failed = res.error_count, "batch processed");
    Ok(Json(res))
}
