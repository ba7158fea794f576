use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use super::repo_types::{Resume, ResumeMetadata};

#[derive(Debug, Serialize)]
pub struct ResumeList {
    pub resumes: Vec<Resume>,
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub resume: Resume,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResumeRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub extracted_text: Option<String>,
}

/// Resume record as pushed by the extension.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub filename: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub pdf_data: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_added: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
    pub is_active: Option<bool>,
    pub metadata: Option<ResumeMetadata>,
}

/// Multipart upload after the body has been read.
#[derive(Debug)]
pub struct Upload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub name: Option<String>,
    pub filename: Option<String>,
}
