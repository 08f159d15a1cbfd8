use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EconomicStatus {
    #[serde(rename = "BPL")]
    BelowPovertyLine,
    #[serde(rename = "APL")]
    AbovePovertyLine,
}

impl std::str::FromStr for EconomicStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BPL" => Ok(EconomicStatus::BelowPovertyLine),
            "APL" => Ok(EconomicStatus::AbovePovertyLine),
            other => Err(format!("Economic status must be BPL or APL, got {}", other)),
        }
    }
}

/// Patient details submitted to the eligibility checker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityRequest {
    pub age: u32,
    pub district: String,
    pub economic_status: EconomicStatus,
    pub has_ration_card: bool,
    pub has_aadhaar: bool,
    pub disease_type: String,
    pub language: String,
}

/// Matched scheme as returned by the eligibility service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemeResult {
    #[serde(default)]
    pub scheme_name: String,
    #[serde(default)]
    pub scheme_type: Option<String>,
    #[serde(default)]
    pub eligibility_score: Option<String>,
    #[serde(default)]
    pub why_eligible: Option<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub apply_steps: Vec<String>,
}
