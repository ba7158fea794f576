use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;

use crate::db::DeletePolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResumeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<i32>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

/// An uploaded resume. The PDF travels base64-encoded in `pdf_data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub user_id: String,
    pub id: String,
    pub name: String,
    pub filename: String,
    pub file_size: i64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_data: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_added: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    pub is_active: bool,
    #[serde(default)]
    pub metadata: ResumeMetadata,
}

impl Resume {
    pub const DELETE_POLICY: DeletePolicy = DeletePolicy::Soft;
    pub const PDF_MIME: &'static str = "application/pdf";

    /// Drops the PDF payload for list and metadata responses.
    pub fn without_pdf(mut self) -> Self {
        self.pdf_data = None;
        self
    }
}

pub fn new_resume_id() -> String {
    format!("resume_{}", uuid::Uuid::new_v4().simple())
}

/// Name shown for an upload when the client supplies none.
pub fn display_name(filename: &str) -> String {
    filename
        .strip_suffix(".pdf")
        .or_else(|| filename.strip_suffix(".PDF"))
        .unwrap_or(filename)
        .to_string()
}

#[derive(Debug, FromRow)]
pub struct ResumeRow {
    pub user_id: String,
    pub id: String,
    pub name: String,
    pub filename: String,
    pub file_size: i64,
    pub mime_type: String,
    pub pdf_data: Option<String>,
    pub date_added: OffsetDateTime,
    pub last_modified: OffsetDateTime,
    pub is_active: bool,
    pub metadata: Json<ResumeMetadata>,
}

impl From<ResumeRow> for Resume {
    fn from(r: ResumeRow) -> Self {
        Self {
            user_id: r.user_id,
            id: r.id,
            name: r.name,
            filename: r.filename,
            file_size: r.file_size,
            mime_type: r.mime_type,
            pdf_data: r.pdf_data,
            date_added: r.date_added,
            last_modified: r.last_modified,
            is_active: r.is_active,
            metadata: r.metadata.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::resume;

    #[test]
    fn display_name_strips_pdf_extension() {
        assert_eq!(display_name("cv.pdf"), "cv");
        assert_eq!(display_name("CV.PDF"), "CV");
        assert_eq!(display_name("resume"), "resume");
    }

    #[test]
    fn without_pdf_hides_payload_in_json() {
        let r = resume("resume_1").without_pdf();
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("pdfData").is_none());
        assert_eq!(json["isActive"], true);
    }
}
