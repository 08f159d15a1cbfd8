//! Request and response types for the Arogya Mitra backend.
//!
//! - `auth`: login/registration payloads, `UserProfile`, `Role`
//! - `envelope`: the `{ success, data, error, ... }` response shape
//! - `scheme`: eligibility check request
//! - `report`: report upload, analysis, OTP and vault types
//! - `subscription`: premium status and upgrade
//! - `language`: persisted UI language preference

pub mod auth;
pub mod envelope;
pub mod language;
pub mod report;
pub mod scheme;
pub mod subscription;

pub use auth::{
    AuthResponse, HospitalRegistration, LoginRequest, PatientRegistration, RegisterRequest, Role,
    UserProfile, UserType,
};
pub use envelope::ApiEnvelope;
pub use language::Language;
pub use report::{
    AccessLogEntry, AnalyzeRequest, OtpVerification, ReportContent, ReportFile, ReportSummary,
    ReportUpload, UploadHistoryEntry,
};
pub use scheme::{EconomicStatus, EligibilityRequest, SchemeResult};
pub use subscription::{Subscription, UpgradeRequest};
