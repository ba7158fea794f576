use axum::{
    extract::{FromRef, State},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, PublicUser, RegisterRequest},
        extractors::AuthUser,
        password::{hash_password, verify_stored},
        repo::UserStore,
        repo_types::{new_user_id, Preferences, PreferencesPatch, User},
        services::JwtKeys,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/preferences", put(update_preferences))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> AppResult<Json<AuthResponse>> {
    payload.validate()?;
    let email = payload.email.map(|e| e.trim().to_lowercase());

    if let Some(email) = email.as_deref() {
        if state.store.find_user_by_email(email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::validation("User already exists"));
        }
    }

    let user_id = payload.user_id.unwrap_or_else(new_user_id);
    if state.store.find_user(&user_id).await?.is_some() {
        warn!(user_id = %user_id, "user id already taken");
        return Err(AppError::validation("User already exists"));
    }

    let password_hash = payload.password.as_deref().map(hash_password).transpose()?;
    let now = OffsetDateTime::now_utc();
    let user = User {
        user_id,
        email,
        password_hash,
        created_at: now,
        last_active: now,
        preferences: Preferences::default(),
    };
    // lost a race with a concurrent registration for the same email or id
    if !state.store.insert_user(&user).await? {
        warn!(user_id = %user.user_id, "user already exists at insert");
        return Err(AppError::validation("User already exists"));
    }

    let token = JwtKeys::from_ref(&state).sign(&user.user_id, user.email.as_deref())?;
    info!(user_id = %user.user_id, anonymous = user.email.is_none(), "user registered");
    Ok(Json(AuthResponse {
        user: PublicUser::summary(user),
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, AppError>,
) -> AppResult<Json<AuthResponse>> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    if !verify_stored(&payload.password, user.password_hash.as_deref())? {
        warn!(user_id = %user.user_id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let now = OffsetDateTime::now_utc();
    state.store.touch_user(&user.user_id, now).await?;

    let token = JwtKeys::from_ref(&state).sign(&user.user_id, user.email.as_deref())?;
    info!(user_id = %user.user_id, "user logged in");
    Ok(Json(AuthResponse {
        user: PublicUser::summary(User {
            last_active: now,
            ..user
        }),
        token,
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<MeResponse>> {
    let user = state
        .store
        .find_user(&user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(MeResponse {
        user: PublicUser::full(user),
    }))
}

#[instrument(skip(state, patch))]
pub async fn update_preferences(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Json(patch), _): WithRejection<Json<PreferencesPatch>, AppError>,
) -> AppResult<Json<MeResponse>> {
    let user = state
        .store
        .update_preferences(&user_id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    info!(user_id = %user_id, "preferences updated");
    Ok(Json(MeResponse {
        user: PublicUser::summary(user),
    }))
}
