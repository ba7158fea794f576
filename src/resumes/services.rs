use base64ct::{Base64, Encoding};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;

use super::dto::{ResumePayload, UpdateResumeRequest, Upload};
use super::repo_types::{display_name, new_resume_id, Resume, ResumeMetadata};
use crate::error::{AppError, AppResult};

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r#"[^A-Za-z0-9._ ()-]"#).unwrap();
}

/// Filename safe to put inside a quoted `Content-Disposition` value.
pub fn attachment_filename(filename: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(filename.trim(), "_");
    if cleaned.is_empty() {
        "resume.pdf".to_string()
    } else {
        cleaned.into_owned()
    }
}

pub fn too_large(max_bytes: usize) -> AppError {
    AppError::validation(format!("File size must be at most {max_bytes} bytes"))
}

pub fn decode_pdf(data: &str) -> anyhow::Result<Vec<u8>> {
    Base64::decode_vec(data.trim()).map_err(|e| anyhow::anyhow!("invalid base64 pdf data: {e}"))
}

/// Validates an upload and turns it into a new live resume.
pub fn from_upload(user_id: &str, upload: Upload, max_bytes: usize, now: OffsetDateTime) -> AppResult<Resume> {
    if upload.bytes.is_empty() {
        return Err(AppError::validation("No PDF file provided"));
    }
    if upload.content_type.as_deref() != Some(Resume::PDF_MIME) {
        return Err(AppError::validation("Only PDF files are allowed"));
    }
    if upload.bytes.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    let original = upload.file_name.unwrap_or_else(|| "resume.pdf".into());
    let name = upload
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| display_name(&original));
    let filename = upload.filename.filter(|f| !f.trim().is_empty()).unwrap_or(original);

    Ok(Resume {
        user_id: user_id.to_string(),
        id: new_resume_id(),
        name,
        filename,
        file_size: upload.bytes.len() as i64,
        mime_type: Resume::PDF_MIME.into(),
        pdf_data: Some(Base64::encode_string(&upload.bytes)),
        date_added: now,
        last_modified: now,
        is_active: true,
        metadata: ResumeMetadata {
            pages: Some(1),
            ..ResumeMetadata::default()
        },
    })
}

impl UpdateResumeRequest {
    pub fn apply_to(self, resume: &mut Resume, at: OffsetDateTime) {
        if let Some(name) = self.name {
            resume.name = name;
        }
        if let Some(keywords) = self.keywords {
            resume.metadata.keywords = keywords;
        }
        if let Some(text) = self.extracted_text {
            resume.metadata.extracted_text = Some(text);
        }
        resume.last_modified = at.max(resume.date_added);
    }
}

impl ResumePayload {
    /// Checks the embedded PDF, returning its decoded length.
    fn pdf_len(&self) -> anyhow::Result<Option<i64>> {
        self.pdf_data
            .as_deref()
            .map(|data| decode_pdf(data).map(|bytes| bytes.len() as i64))
            .transpose()
    }

    pub fn into_new(self, user_id: &str, id: String, last_modified: OffsetDateTime) -> anyhow::Result<Resume> {
        let pdf_len = self.pdf_len()?;
        let date_added = self.date_added.unwrap_or(last_modified).min(last_modified);
        let filename = self.filename.unwrap_or_default();
        Ok(Resume {
            user_id: user_id.to_string(),
            id,
            name: self.name.unwrap_or_else(|| display_name(&filename)),
            filename,
            file_size: self.file_size.or(pdf_len).unwrap_or(0),
            mime_type: self.mime_type.unwrap_or_else(|| Resume::PDF_MIME.into()),
            pdf_data: self.pdf_data,
            date_added,
            last_modified,
            is_active: self.is_active.unwrap_or(true),
            metadata: self.metadata.unwrap_or_default(),
        })
    }

    pub fn apply_to(self, resume: &mut Resume, at: OffsetDateTime) -> anyhow::Result<()> {
        let pdf_len = self.pdf_len()?;
        if let Some(v) = self.name {
            resume.name = v;
        }
        if let Some(v) = self.filename {
            resume.filename = v;
        }
        if let Some(v) = self.file_size.or(pdf_len) {
            resume.file_size = v;
        }
        if let Some(v) = self.mime_type {
            resume.mime_type = v;
        }
        if let Some(v) = self.pdf_data {
            resume.pdf_data = Some(v);
        }
        if let Some(v) = self.is_active {
            resume.is_active = v;
        }
        if let Some(v) = self.metadata {
            resume.metadata = v;
        }
        resume.last_modified = at.max(resume.date_added);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::testing::{resume, USER};
    use time::macros::datetime;

    fn upload(bytes: &[u8], content_type: &str) -> Upload {
        Upload {
            bytes: Bytes::copy_from_slice(bytes),
            content_type: Some(content_type.into()),
            file_name: Some("Jane Doe CV.pdf".into()),
            name: None,
            filename: None,
        }
    }

    #[test]
    fn upload_defaults_name_from_file() {
        let now = datetime!(2024-05-01 00:00 UTC);
        let r = from_upload(USER, upload(b"%PDF-1.7", "application/pdf"), 1024, now).unwrap();
        assert_eq!(r.name, "Jane Doe CV");
        assert_eq!(r.filename, "Jane Doe CV.pdf");
        assert_eq!(r.file_size, 8);
        assert_eq!(decode_pdf(r.pdf_data.as_deref().unwrap()).unwrap(), b"%PDF-1.7");
        assert!(r.is_active);
    }

    #[test]
    fn upload_rejects_wrong_type_and_oversize() {
        let now = OffsetDateTime::now_utc();
        let err = from_upload(USER, upload(b"hello", "text/plain"), 1024, now).unwrap_err();
        assert_eq!(err.to_string(), "Only PDF files are allowed");

        let big = vec![b'x'; 2048];
        let err = from_upload(USER, upload(&big, "application/pdf"), 1024, now).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn attachment_filename_strips_header_breakers() {
        assert_eq!(attachment_filename("cv \"final\".pdf"), "cv _final_.pdf");
        assert_eq!(attachment_filename("a\r\nb.pdf"), "a__b.pdf");
        assert_eq!(attachment_filename("  "), "resume.pdf");
    }

    #[test]
    fn payload_with_bad_base64_is_refused() {
        let payload = ResumePayload {
            pdf_data: Some("not base64!!".into()),
            ..Default::default()
        };
        assert!(payload
            .into_new(USER, "resume_1".into(), OffsetDateTime::now_utc())
            .is_err());
    }

    #[test]
    fn update_request_touches_metadata_only() {
        let mut r = resume("resume_1");
        let at = datetime!(2024-06-01 00:00 UTC);
        UpdateResumeRequest {
            keywords: Some(vec!["rust".into()]),
            ..Default::default()
        }
        .apply_to(&mut r, at);
        assert_eq!(r.name, "cv");
        assert_eq!(r.metadata.keywords, vec!["rust"]);
        assert_eq!(r.last_modified, at);
    }
}
