use async_trait::async_trait;
use serde::Deserialize;

use crate::models::lead::MISSING_SUMMARY;
use crate::models::{Booking, LeadAnalysis, LeadQuality};
use crate::services::ai::{LlmProvider, Message};

const SYSTEM_PROMPT: &str = r#"Du bedömer inkommande säljprospekt åt ett litet säljteam.

Svara ENDAST med giltig JSON (ingen markdown, ingen förklaring) med exakt denna struktur:
{
  "summary": "En kort sammanfattning av prospektet, max 2 meningar.",
  "quality": "Kall|Varm|Het"
}

Kvalitetsregler:
- "Het": tydlig köpsignal, budget eller tidsplan nämns
- "Varm": intresse finns men inget konkret behov ännu
- "Kall": vagt, ointresserat eller för lite information
"#;

/// Produces a summary and quality rating for a booking's notes.
#[async_trait]
pub trait LeadAnalyzer: Send + Sync {
    async fn analyze(&self, booking: &Booking) -> anyhow::Result<LeadAnalysis>;
}

pub struct LlmLeadAnalyzer {
    llm: Box<dyn LlmProvider>,
}

impl LlmLeadAnalyzer {
    pub fn new(llm: Box<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl LeadAnalyzer for LlmLeadAnalyzer {
    async fn analyze(&self, booking: &Booking) -> anyhow::Result<LeadAnalysis> {
        let response = self
            .llm
            .chat(SYSTEM_PROMPT, &[Message::user(build_prompt(booking))])
            .await?;

        Ok(parse_lead_response(&response))
    }
}

pub fn build_prompt(booking: &Booking) -> String {
    format!(
        "Analysera följande potentiella kundbokning och ge en kort sammanfattning (max 2 meningar) \
         samt bedöm led-kvaliteten (Kall, Varm eller Het).\n\n\
         Kund: {}\n\
         Anteckningar: {}\n\
         Handläggare: {}",
        booking.customer_name,
        booking.notes,
        booking.representative.as_str(),
    )
}

#[derive(Debug, Deserialize)]
struct RawLeadResponse {
    summary: Option<String>,
    quality: Option<String>,
}

fn parse_lead_response(response: &str) -> LeadAnalysis {
    let Some(raw) = extract_json(response) else {
        tracing::warn!("failed to parse lead analysis as JSON, using defaults");
        return LeadAnalysis {
            summary: MISSING_SUMMARY.to_string(),
            quality: LeadQuality::default(),
        };
    };

    let summary = raw
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| MISSING_SUMMARY.to_string());

    let quality = match raw.quality.as_deref() {
        Some(token) => LeadQuality::parse(token).unwrap_or_else(|| {
            tracing::warn!(quality = token, "unknown lead quality, defaulting to cold");
            LeadQuality::default()
        }),
        None => LeadQuality::default(),
    };

    LeadAnalysis { summary, quality }
}

fn extract_json(response: &str) -> Option<RawLeadResponse> {
    if let Ok(raw) = serde_json::from_str::<RawLeadResponse>(response) {
        return Some(raw);
    }

    // Strip markdown code fences
    let trimmed = response.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(raw) = serde_json::from_str::<RawLeadResponse>(cleaned) {
        return Some(raw);
    }

    // Outermost object embedded in prose
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<RawLeadResponse>(&cleaned[start..=end]).ok()
}
