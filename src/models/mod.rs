pub mod booking;
pub mod event;
pub mod lead;

pub use booking::{Booking, BookingDraft, BookingPatch, BookingStatus, Representative};
pub use event::BookingEvent;
pub use lead::{LeadAnalysis, LeadQuality};
