use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeRequest {
    pub payment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Subscription {
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub ai_analysis_count: Option<i64>,
    #[serde(default)]
    pub is_active_sub: Option<bool>,
}

impl Subscription {
    pub fn plan_display(&self) -> &'static str {
        if self.is_premium {
            "Premium"
        } else {
            "Free"
        }
    }
}
