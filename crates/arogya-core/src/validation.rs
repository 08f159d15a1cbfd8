//! Client-side form validation.
//!
//! Field validators return `Some(message)` when the value is rejected.
//! Form validators collect those into a map keyed by field name; an empty
//! map means the form can be submitted.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{
    EligibilityRequest, HospitalRegistration, LoginRequest, PatientRegistration, ReportUpload,
};

pub type ValidationErrors = BTreeMap<&'static str, String>;

const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;
const MAX_AGE: u32 = 120;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// Indian mobile numbers
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[6-9][0-9]{9}$").expect("valid phone pattern"));

static AADHAAR_LAST4_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}$").expect("valid aadhaar pattern"));

// ===== Field validators =====

/// `local@domain.tld` with no whitespace.
pub fn validate_email(email: &str) -> Option<String> {
    if email.is_empty() {
        return Some("Email is required".to_string());
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Some("Please enter a valid email address".to_string());
    }
    None
}

/// Ten digits, the first between 6 and 9.
pub fn validate_phone(phone: &str) -> Option<String> {
    if phone.is_empty() {
        return Some("Phone number is required".to_string());
    }
    if !PHONE_PATTERN.is_match(phone) {
        return Some("Please enter a valid Indian phone number".to_string());
    }
    None
}

pub fn validate_password(password: &str) -> Option<String> {
    if password.is_empty() {
        return Some("Password is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ));
    }
    None
}

pub fn validate_confirm_password(password: &str, confirm: &str) -> Option<String> {
    if confirm.is_empty() {
        return Some("Please confirm your password".to_string());
    }
    if password != confirm {
        return Some("Passwords do not match".to_string());
    }
    None
}

pub fn validate_name(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("Name is required".to_string());
    }
    if name.chars().count() < MIN_NAME_LEN {
        return Some(format!("Name must be at least {} characters long", MIN_NAME_LEN));
    }
    None
}

pub fn validate_age(age: u32) -> Option<String> {
    if age == 0 {
        return Some("Age is required".to_string());
    }
    if age > MAX_AGE {
        return Some(format!("Please enter a valid age between 1 and {}", MAX_AGE));
    }
    None
}

/// Optional; when given it must be exactly four digits.
pub fn validate_aadhaar_last4(aadhaar: Option<&str>) -> Option<String> {
    match aadhaar {
        Some(digits) if !digits.is_empty() && !AADHAAR_LAST4_PATTERN.is_match(digits) => {
            Some("Please enter last 4 digits of Aadhaar".to_string())
        }
        _ => None,
    }
}

fn validate_required(value: &str, label: &str) -> Option<String> {
    if value.trim().is_empty() {
        return Some(format!("{} is required", label));
    }
    None
}

// ===== Form validators =====

fn collect(checks: impl IntoIterator<Item = (&'static str, Option<String>)>) -> ValidationErrors {
    checks
        .into_iter()
        .filter_map(|(field, error)| error.map(|message| (field, message)))
        .collect()
}

pub fn validate_login(request: &LoginRequest) -> ValidationErrors {
    collect([
        ("username", validate_required(&request.username, "Username")),
        ("password", validate_password(&request.password)),
    ])
}

pub fn validate_patient_registration(
    registration: &PatientRegistration,
    confirm_password: &str,
) -> ValidationErrors {
    collect([
        ("full_name", validate_name(&registration.full_name)),
        ("email", validate_email(&registration.email)),
        ("phone_number", validate_phone(&registration.phone_number)),
        ("age", validate_age(registration.age)),
        ("district", validate_required(&registration.district, "District")),
        (
            "disease_type",
            validate_required(&registration.disease_type, "Disease type"),
        ),
        (
            "aadhaar_last4",
            validate_aadhaar_last4(registration.aadhaar_last4.as_deref()),
        ),
        ("username", validate_required(&registration.username, "Username")),
        ("password", validate_password(&registration.password)),
        (
            "confirm_password",
            validate_confirm_password(&registration.password, confirm_password),
        ),
    ])
}

pub fn validate_hospital_registration(
    registration: &HospitalRegistration,
    confirm_password: &str,
) -> ValidationErrors {
    collect([
        ("staff_name", validate_name(&registration.staff_name)),
        ("email", validate_email(&registration.email)),
        (
            "hospital_name",
            validate_required(&registration.hospital_name, "Hospital name"),
        ),
        (
            "license_number",
            validate_required(&registration.license_number, "License number"),
        ),
        ("username", validate_required(&registration.username, "Username")),
        ("password", validate_password(&registration.password)),
        (
            "confirm_password",
            validate_confirm_password(&registration.password, confirm_password),
        ),
    ])
}

pub fn validate_scheme_check(request: &EligibilityRequest) -> ValidationErrors {
    collect([
        ("age", validate_age(request.age)),
        ("district", validate_required(&request.district, "District")),
        (
            "disease_type",
            validate_required(&request.disease_type, "Disease type"),
        ),
    ])
}

pub fn validate_report_upload(upload: &ReportUpload) -> ValidationErrors {
    let phone = if upload.patient_phone.is_empty() {
        Some("Patient phone number is required".to_string())
    } else {
        validate_phone(&upload.patient_phone)
    };
    let file = upload
        .file
        .bytes
        .is_empty()
        .then(|| "Report file is required".to_string());

    collect([
        ("patient_phone", phone),
        (
            "patient_aadhaar_last4",
            validate_aadhaar_last4(upload.patient_aadhaar_last4.as_deref()),
        ),
        ("title", validate_required(&upload.title, "Report title")),
        ("scan_type", validate_required(&upload.scan_type, "Scan type")),
        (
            "hospital_name",
            validate_required(&upload.hospital_name, "Hospital name"),
        ),
        ("test_date", validate_required(&upload.test_date, "Test date")),
        ("report_file", file),
    ])
}
