//! Fixtures shared by unit tests.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64ct::{Base64, Encoding};
use serde_json::Value;
use time::macros::datetime;
use tower::ServiceExt;

use crate::applications::repo_types::{Application, ApplicationSource, ApplicationStatus, StatusEntry};
use crate::auth::services::JwtKeys;
use crate::config::AppConfig;
use crate::memory::MemoryStore;
use crate::resumes::repo_types::{Resume, ResumeMetadata};
use crate::state::AppState;

pub const USER: &str = "user_a";

pub fn application(id: &str) -> Application {
    let at = datetime!(2024-01-01 00:00 UTC);
    Application {
        user_id: USER.into(),
        id: id.into(),
        url: "https://jobs.example.com/1".into(),
        site: "example".into(),
        company_name: "Acme".into(),
        job_title: "Engineer".into(),
        resume_id: None,
        resume_name: None,
        resume_filename: None,
        status: ApplicationStatus::Applied,
        tags: vec![],
        date_applied: at,
        date_created: at,
        last_updated: at,
        notes: None,
        status_history: vec![StatusEntry {
            status: ApplicationStatus::Applied,
            date: at,
            notes: None,
        }],
        salary: None,
        location: None,
        application_source: ApplicationSource::Manual,
    }
}

pub fn resume(id: &str) -> Resume {
    let at = datetime!(2024-01-01 00:00 UTC);
    Resume {
        user_id: USER.into(),
        id: id.into(),
        name: "cv".into(),
        filename: "cv.pdf".into(),
        file_size: 8,
        mime_type: Resume::PDF_MIME.into(),
        pdf_data: Some(Base64::encode_string(b"%PDF-1.4")),
        date_added: at,
        last_modified: at,
        is_active: true,
        metadata: ResumeMetadata::default(),
    }
}

pub fn state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::from_parts(Arc::new(AppConfig::for_tests()), store.clone());
    (state, store)
}

pub fn bearer(state: &AppState, user_id: &str) -> String {
    let token = JwtKeys::from_config(&state.config.jwt)
        .sign(user_id, None)
        .expect("sign token");
    format!("Bearer {token}")
}

/// Sends one request through the router and decodes the JSON reply.
pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        req = req.header(header::AUTHORIZATION, auth);
    }
    let req = match body {
        Some(json) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("build request");

    let res = app.clone().oneshot(req).await.expect("router is infallible");
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
