use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// UI language preference. Kannada is the default for rural users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Kn,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Kn => "kn",
        }
    }

    /// Name the analysis service expects in its `language` field.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Kn => "Kannada",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "kn" | "kannada" => Ok(Language::Kn),
            other => Err(format!("Unsupported language: {}", other)),
        }
    }
}
