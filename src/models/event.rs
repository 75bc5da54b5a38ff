use serde::Serialize;

use super::Booking;

/// Change notification fanned out to event-stream subscribers.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BookingEvent {
    Created { booking: Booking },
    Updated { booking: Booking },
    #[serde(rename_all = "camelCase")]
    AnalysisStarted { booking_id: String },
    #[serde(rename_all = "camelCase")]
    AnalysisFinished { booking_id: String },
}

impl BookingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::Created { .. } => "booking_created",
            BookingEvent::Updated { .. } => "booking_updated",
            BookingEvent::AnalysisStarted { .. } => "analysis_started",
            BookingEvent::AnalysisFinished { .. } => "analysis_finished",
        }
    }
}
