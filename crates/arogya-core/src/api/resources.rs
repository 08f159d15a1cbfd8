//! Typed wrappers for the backend's resource endpoints.
//!
//! Every method goes through `SessionClient::request`, so all of them get
//! credential attachment and the refresh-and-retry-once behavior. Bodies
//! are returned as parsed JSON; callers decode the envelope they expect.

use serde_json::Value;

use crate::models::{
    AnalyzeRequest, EligibilityRequest, OtpVerification, RegisterRequest, ReportContent,
    ReportUpload, UpgradeRequest,
};

use super::client::{RequestOptions, SessionClient};
use super::endpoints;
use super::transport::RequestBody;
use super::ApiError;

impl SessionClient {
    // ===== Registration =====

    pub async fn register(&self, registration: &RegisterRequest) -> Result<Value, ApiError> {
        let endpoint = match registration {
            RegisterRequest::Patient(_) => endpoints::REGISTER_PATIENT,
            RegisterRequest::Hospital(_) => endpoints::REGISTER_HOSPITAL,
        };
        self.post(endpoint, registration).await
    }

    // ===== Schemes =====

    pub async fn check_scheme_eligibility(
        &self,
        request: &EligibilityRequest,
    ) -> Result<Value, ApiError> {
        self.post(endpoints::CHECK_ELIGIBILITY, request).await
    }

    // ===== Hospital staff =====

    /// Upload a report as multipart form data.
    pub async fn upload_report(&self, upload: ReportUpload) -> Result<Value, ApiError> {
        let options = RequestOptions::post().body(RequestBody::Multipart(upload.into_form()));
        self.request(endpoints::UPLOAD_REPORT, options).await
    }

    pub async fn upload_history(&self) -> Result<Value, ApiError> {
        self.get(endpoints::UPLOAD_HISTORY).await
    }

    // ===== Patient vault =====

    pub async fn patient_reports(&self) -> Result<Value, ApiError> {
        self.get(endpoints::PATIENT_REPORTS).await
    }

    pub async fn analyze_report(&self, request: &AnalyzeRequest) -> Result<Value, ApiError> {
        self.post(endpoints::ANALYZE_REPORT, request).await
    }

    pub async fn request_otp(&self) -> Result<Value, ApiError> {
        self.request(endpoints::REQUEST_OTP, RequestOptions::post())
            .await
    }

    pub async fn verify_otp(&self, otp_code: &str) -> Result<Value, ApiError> {
        let body = OtpVerification {
            otp_code: otp_code.trim().to_string(),
        };
        self.post(endpoints::VERIFY_OTP, &body).await
    }

    /// Fetch a report. A JSON body comes back as `ReportContent::Json`,
    /// anything else as the raw file.
    pub async fn view_report(&self, report_id: i64) -> Result<ReportContent, ApiError> {
        let endpoint = endpoints::view_report(report_id);
        let response = self.execute(&endpoint, &RequestOptions::get()).await?;

        if response.is_json() {
            let value = response.json().ok_or_else(|| {
                ApiError::InvalidResponse(format!("Failed to parse JSON response from {}", endpoint))
            })?;
            return Ok(ReportContent::Json(value));
        }

        Ok(ReportContent::File {
            content_type: response
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes: response.body,
        })
    }

    pub async fn access_logs(&self) -> Result<Value, ApiError> {
        self.get(endpoints::ACCESS_LOGS).await
    }

    // ===== Subscription =====

    pub async fn subscription_status(&self) -> Result<Value, ApiError> {
        self.get(endpoints::SUBSCRIPTION).await
    }

    pub async fn upgrade_premium(&self, request: &UpgradeRequest) -> Result<Value, ApiError> {
        self.post(endpoints::UPGRADE_PREMIUM, request).await
    }
}
