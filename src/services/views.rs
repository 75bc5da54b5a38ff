use serde::Serialize;

use crate::models::{Booking, BookingStatus, LeadQuality};

/// How many upcoming bookings get an insight card.
pub const INSIGHT_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub pending: usize,
    pub hot_leads: usize,
    pub completed: usize,
}

/// Ascending by date and time. Equal timestamps keep collection order and
/// bookings with an unreadable date or time go last.
pub fn chronological(bookings: &[Booking]) -> Vec<&Booking> {
    let mut sorted: Vec<&Booking> = bookings.iter().collect();
    sorted.sort_by_key(|b| {
        let starts_at = b.starts_at();
        (starts_at.is_none(), starts_at)
    });
    sorted
}

pub fn pending(bookings: &[Booking]) -> Vec<&Booking> {
    chronological(bookings)
        .into_iter()
        .filter(|b| b.is_pending())
        .collect()
}

pub fn upcoming(bookings: &[Booking], n: usize) -> Vec<&Booking> {
    pending(bookings).into_iter().take(n).collect()
}

pub fn bookings_on<'a>(bookings: &'a [Booking], date: &str) -> Vec<&'a Booking> {
    bookings.iter().filter(|b| b.date == date).collect()
}

pub fn stats(bookings: &[Booking]) -> DashboardStats {
    DashboardStats {
        pending: bookings.iter().filter(|b| b.is_pending()).count(),
        hot_leads: bookings
            .iter()
            .filter(|b| b.lead_quality == Some(LeadQuality::Hot))
            .count(),
        completed: bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Completed)
            .count(),
    }
}
