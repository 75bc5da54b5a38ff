use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::lead::{LeadAnalysis, LeadQuality};

pub const DEFAULT_TIME: &str = "09:00";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub customer_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    pub date: String,
    pub time: String,
    pub representative: Representative,
    #[serde(default)]
    pub notes: String,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_quality: Option<LeadQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    /// Fields this build doesn't know, carried through to the next persist.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Booking {
    /// `date` and `time` read as one local point in time.
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()?;
        let time = NaiveTime::parse_from_str(&self.time, "%H:%M").ok()?;
        Some(date.and_time(time))
    }

    pub fn has_notes(&self) -> bool {
        !self.notes.trim().is_empty()
    }

    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Representative {
    #[default]
    Niclas,
    Johan,
}

impl Representative {
    pub fn as_str(&self) -> &'static str {
        match self {
            Representative::Niclas => "Niclas",
            Representative::Johan => "Johan",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// Raw intake input. Every field may be missing; defaults are filled in by
/// the store on create.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub representative: Option<Representative>,
    pub notes: Option<String>,
}

impl BookingDraft {
    /// Trims text fields and drops the ones left blank.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            customer_name: clean(self.customer_name),
            phone: clean(self.phone),
            email: clean(self.email),
            date: clean(self.date),
            time: clean(self.time),
            representative: self.representative,
            notes: clean(self.notes),
        }
    }

    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.customer_name.as_deref().map_or(true, str::is_empty) {
            missing.push("customerName");
        }
        if self.phone.as_deref().map_or(true, str::is_empty) {
            missing.push("phone");
        }
        missing
    }
}

/// Field-level update merged into an existing booking.
#[derive(Debug, Clone, Default)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub analysis: Option<LeadAnalysis>,
}

impl BookingPatch {
    pub fn analysis(analysis: LeadAnalysis) -> Self {
        Self {
            analysis: Some(analysis),
            ..Self::default()
        }
    }

    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, booking: &mut Booking) {
        if let Some(status) = self.status {
            booking.status = status;
        }
        // Summary and quality are always written as a pair.
        if let Some(analysis) = &self.analysis {
            booking.ai_summary = Some(analysis.summary.clone());
            booking.lead_quality = Some(analysis.quality);
        }
    }
}
