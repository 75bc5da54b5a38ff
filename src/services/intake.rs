use crate::errors::AppError;
use crate::models::{Booking, BookingDraft};
use crate::state::AppState;

/// Validates the intake form, stores the booking and queues lead analysis.
///
/// The booking is in the collection before analysis starts; enrichment lands
/// later as a field update.
pub fn submit_booking(state: &AppState, draft: BookingDraft) -> Result<Booking, AppError> {
    let draft = draft.normalized();

    let missing = draft.missing_required_fields();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let booking = state.store.create(draft);
    state.enricher.spawn(booking.clone());

    Ok(booking)
}
