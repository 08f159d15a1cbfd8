use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::transport::{FilePart, MultipartForm};

/// Multipart field the backend reads the report file from
const REPORT_FILE_FIELD: &str = "report_file";

#[derive(Debug, Clone)]
pub struct ReportFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ReportFile {
    /// Read a report from disk, guessing the content type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read report file: {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("report")
            .to_string();
        let content_type = content_type_for(&file_name).to_string();
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "dcm" => "application/dicom",
        _ => "application/octet-stream",
    }
}

/// Hospital-side upload of a report mapped to a patient by phone number.
#[derive(Debug, Clone)]
pub struct ReportUpload {
    pub patient_phone: String,
    pub patient_aadhaar_last4: Option<String>,
    pub title: String,
    pub scan_type: String,
    pub hospital_name: String,
    pub test_date: String,
    pub file: ReportFile,
}

impl ReportUpload {
    pub fn into_form(self) -> MultipartForm {
        MultipartForm::new()
            .text("patient_phone", self.patient_phone)
            .text(
                "patient_aadhaar_last4",
                self.patient_aadhaar_last4.unwrap_or_default(),
            )
            .text("title", self.title)
            .text("scan_type", self.scan_type)
            .text("hospital_name", self.hospital_name)
            .text("test_date", self.test_date)
            .file(FilePart {
                field: REPORT_FILE_FIELD.to_string(),
                file_name: self.file.file_name,
                content_type: self.file.content_type,
                bytes: self.file.bytes,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub report_id: i64,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerification {
    pub otp_code: String,
}

/// What the view-report endpoint hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportContent {
    Json(Value),
    File { content_type: String, bytes: Vec<u8> },
}

impl ReportContent {
    /// File extension to save a downloaded report under.
    pub fn extension(&self) -> &'static str {
        match self {
            ReportContent::Json(_) => "json",
            ReportContent::File { content_type, .. } => match content_type.as_str() {
                ct if ct.starts_with("application/pdf") => "pdf",
                ct if ct.starts_with("image/jpeg") => "jpg",
                ct if ct.starts_with("image/png") => "png",
                _ => "bin",
            },
        }
    }
}

/// Row of the patient's report vault.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportSummary {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub scan_type: Option<String>,
    #[serde(default)]
    pub hospital_name: Option<String>,
    #[serde(default)]
    pub uploaded_date: Option<String>,
    #[serde(default)]
    pub is_analyzed: bool,
    #[serde(default)]
    pub requires_otp: bool,
    #[serde(default)]
    pub can_view: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UploadHistoryEntry {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub scan_type: Option<String>,
    #[serde(default)]
    pub uploaded_date: Option<String>,
    #[serde(default)]
    pub is_analyzed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessLogEntry {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub report_title: Option<String>,
    #[serde(default)]
    pub access_type: Option<String>,
    #[serde(default)]
    pub otp_verified: bool,
    #[serde(default)]
    pub access_granted: bool,
    #[serde(default)]
    pub accessed_at: Option<String>,
}
