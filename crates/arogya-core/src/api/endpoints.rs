//! Backend REST paths. All are relative to the configured base address.

pub const PATIENT_LOGIN: &str = "/api/auth/patient-login/";
pub const HOSPITAL_LOGIN: &str = "/api/auth/hospital-login/";
pub const REGISTER_PATIENT: &str = "/api/auth/register-patient/";
pub const REGISTER_HOSPITAL: &str = "/api/auth/register-hospital/";
pub const LOGOUT: &str = "/api/auth/logout/";
pub const REFRESH_TOKEN: &str = "/api/auth/refresh-token/";

pub const CHECK_ELIGIBILITY: &str = "/api/check-eligibility/";
pub const ANALYZE_REPORT: &str = "/api/analyze-report/";

pub const UPLOAD_REPORT: &str = "/api/hospital/upload-report/";
pub const UPLOAD_HISTORY: &str = "/api/hospital/upload-history/";

pub const PATIENT_REPORTS: &str = "/api/patient/reports/";
pub const REQUEST_OTP: &str = "/api/patient/request-otp/";
pub const VERIFY_OTP: &str = "/api/patient/verify-otp/";
pub const ACCESS_LOGS: &str = "/api/patient/access-logs/";

pub const SUBSCRIPTION: &str = "/api/subscription/";
pub const UPGRADE_PREMIUM: &str = "/api/upgrade-premium/";

pub fn view_report(report_id: i64) -> String {
    format!("/api/patient/report/{}/", report_id)
}
