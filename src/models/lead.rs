use serde::{Deserialize, Serialize};

pub const FALLBACK_SUMMARY: &str = "Kunde inte analysera just nu.";
pub const MISSING_SUMMARY: &str = "Ingen analys tillgänglig.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LeadQuality {
    #[default]
    #[serde(rename = "Kall", alias = "cold", alias = "kall")]
    Cold,
    #[serde(rename = "Varm", alias = "warm", alias = "varm")]
    Warm,
    #[serde(rename = "Het", alias = "hot", alias = "het")]
    Hot,
}

impl LeadQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadQuality::Cold => "Kall",
            LeadQuality::Warm => "Varm",
            LeadQuality::Hot => "Het",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "kall" | "cold" => Some(LeadQuality::Cold),
            "varm" | "warm" => Some(LeadQuality::Warm),
            "het" | "hot" => Some(LeadQuality::Hot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeadAnalysis {
    pub summary: String,
    pub quality: LeadQuality,
}

impl LeadAnalysis {
    /// Substituted when the analyzer call itself fails.
    pub fn fallback() -> Self {
        Self {
            summary: FALLBACK_SUMMARY.to_string(),
            quality: LeadQuality::Cold,
        }
    }
}
