use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Login/registration route discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Patient,
    Hospital,
}

/// Role of the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "PATIENT")]
    Patient,
    #[serde(rename = "HOSPITAL_STAFF")]
    HospitalStaff,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::HospitalStaff => "Hospital staff",
        }
    }
}

impl From<UserType> for Role {
    fn from(user_type: UserType) -> Self {
        match user_type {
            UserType::Patient => Role::Patient,
            UserType::Hospital => Role::HospitalStaff,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub user_type: UserType,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PatientRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone_number: String,
    pub age: u32,
    pub district: String,
    pub economic_status: String,
    #[serde(default)]
    pub has_ration_card: bool,
    #[serde(default)]
    pub has_aadhaar: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aadhaar_last4: Option<String>,
    pub disease_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HospitalRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub staff_name: String,
    pub hospital_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub license_number: String,
}

/// Serializes with a `user_type` tag next to the registration fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "lowercase")]
pub enum RegisterRequest {
    Patient(PatientRegistration),
    Hospital(HospitalRegistration),
}

impl RegisterRequest {
    pub fn user_type(&self) -> UserType {
        match self {
            RegisterRequest::Patient(_) => UserType::Patient,
            RegisterRequest::Hospital(_) => UserType::Hospital,
        }
    }
}

/// Cached profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Explicit role when the backend sent one, otherwise inferred from
    /// the presence of a hospital name.
    pub fn role(&self) -> Role {
        match self.role {
            Some(role) => role,
            None if self.hospital_name.is_some() => Role::HospitalStaff,
            None => Role::Patient,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.staff_name.as_deref())
            .unwrap_or(&self.username)
    }
}

/// Token-bearing fields of a login or refresh response.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuthResponse {
    /// Lenient view of a response body; fields that do not fit are absent.
    pub fn from_value(value: &Value) -> Self {
        let str_field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            success: value.get("success").and_then(Value::as_bool).unwrap_or(false),
            token: str_field("token"),
            refresh: str_field("refresh"),
            role: value
                .get("role")
                .and_then(|r| serde_json::from_value(r.clone()).ok()),
            user: value
                .get("user")
                .filter(|u| u.is_object())
                .and_then(|u| serde_json::from_value(u.clone()).ok()),
            error: str_field("error"),
        }
    }
}
