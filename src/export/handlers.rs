use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    export::{dto::Backup, services},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/export/csv", get(export_csv))
        .route("/export/json", get(export_json))
}

fn download_headers(content_type: &'static str, filename: &str) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
            .map_err(|e| AppError::Internal(e.into()))?,
    );
    Ok(headers)
}

#[instrument(skip(state))]
pub async fn export_csv(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<(HeaderMap, String)> {
    let body = services::csv(state.store.as_ref(), &user_id).await?;
    let day = services::utc_day(OffsetDateTime::now_utc());
    info!(user_id = %user_id, bytes = body.len(), "csv export");
    Ok((download_headers("text/csv", &format!("applications_{day}.csv"))?, body))
}

#[instrument(skip(state))]
pub async fn export_json(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<(HeaderMap, Json<Backup>)> {
    let now = OffsetDateTime::now_utc();
    let backup = services::backup(state.store.as_ref(), &user_id, now).await?;
    info!(
        user_id = %user_id,
        applications = backup.stats.total_applications,
        resumes = backup.stats.total_resumes,
        "json export"
    );
    let filename = format!("jobtrail_backup_{}.json", services::utc_day(now));
    Ok((download_headers("application/json", &filename)?, Json(backup)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use time::macros::datetime;
    use tower::ServiceExt;

    use super::*;
    use crate::applications::repo::ApplicationStore;
    use crate::auth::repo::UserStore;
    use crate::auth::repo_types::{Preferences, User};
    use crate::resumes::repo::ResumeStore;
    use crate::testing::{application, bearer, call, resume, state, USER};

    fn app(state: AppState) -> Router {
        crate::export::router().with_state(state)
    }

    fn user() -> User {
        let at = datetime!(2024-01-01 00:00 UTC);
        User {
            user_id: USER.into(),
            email: Some("a@example.com".into()),
            password_hash: Some("hash".into()),
            created_at: at,
            last_active: at,
            preferences: Preferences::default(),
        }
    }

    #[tokio::test]
    async fn csv_is_an_attachment_sorted_newest_first() {
        let (state, store) = state();
        let mut old = application("app_old");
        old.company_name = "Old Co".into();
        let mut new = application("app_new");
        new.company_name = "New Co".into();
        new.date_applied = datetime!(2024-05-01 00:00 UTC);
        store.insert_application(&old).await.unwrap();
        store.insert_application(&new).await.unwrap();
        let auth = bearer(&state, USER);

        let req = Request::builder()
            .uri("/export/csv")
            .header(header::AUTHORIZATION, &auth)
            .body(Body::empty())
            .unwrap();
        let res = app(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/csv");
        let disposition = res.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"applications_"));

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("\"New Co\""));
        assert!(lines[2].starts_with("\"Old Co\""));
    }

    #[tokio::test]
    async fn json_backup_omits_secrets_and_pdfs() {
        let (state, store) = state();
        store.insert_user(&user()).await.unwrap();
        store.insert_application(&application("app_1")).await.unwrap();
        store.insert_resume(&resume("resume_1")).await.unwrap();
        store.insert_resume(&resume("resume_2")).await.unwrap();
        store.delete_resume(USER, "resume_2").await.unwrap();
        let auth = bearer(&state, USER);

        let (status, body) = call(&app(state), "GET", "/export/json", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "1.0");
        assert!(body["exportDate"].is_string());
        assert_eq!(body["user"]["userId"], USER);
        assert_eq!(body["user"]["email"], "a@example.com");
        assert!(body["user"].get("passwordHash").is_none());
        assert_eq!(body["applications"][0]["id"], "app_1");
        assert_eq!(body["resumes"].as_array().unwrap().len(), 1);
        assert!(body["resumes"][0].get("pdfData").is_none());
        assert_eq!(body["stats"]["totalApplications"], 1);
        assert_eq!(body["stats"]["totalResumes"], 1);
    }

    #[tokio::test]
    async fn json_backup_for_unknown_user_is_not_found() {
        let (state, _) = state();
        let auth = bearer(&state, "user_ghost");
        let (status, body) = call(&app(state), "GET", "/export/json", Some(&auth), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");
    }
}
