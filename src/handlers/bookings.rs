use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Booking, BookingDraft, BookingStatus, LeadQuality};
use crate::services::enrichment::LeadEnricher;
use crate::services::intake::submit_booking;
use crate::services::views::{self, DashboardStats, INSIGHT_COUNT};
use crate::state::AppState;

use super::check_auth;

#[derive(Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    booking: Booking,
    analyzing: bool,
}

impl BookingResponse {
    fn new(booking: Booking, enricher: &LeadEnricher) -> Self {
        let analyzing = enricher.is_analyzing(&booking.id);
        Self { booking, analyzing }
    }
}

// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let snapshot = state.store.snapshot();
    let response = views::chronological(&snapshot)
        .into_iter()
        .map(|b| BookingResponse::new(b.clone(), &state.enricher))
        .collect();

    Ok(Json(response))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<BookingDraft>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = submit_booking(&state, draft)?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::new(booking, &state.enricher)),
    ))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = state
        .store
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    Ok(Json(BookingResponse::new(booking, &state.enricher)))
}

// POST /api/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = state
        .store
        .set_status(&id, body.status)
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    tracing::info!(booking_id = %id, status = body.status.as_str(), "booking status changed");
    Ok(Json(BookingResponse::new(booking, &state.enricher)))
}

// GET /api/dashboard
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightCard {
    id: String,
    customer_name: String,
    date: String,
    time: String,
    lead_quality: Option<LeadQuality>,
    ai_summary: Option<String>,
    analyzing: bool,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    stats: DashboardStats,
    insights: Vec<InsightCard>,
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let snapshot = state.store.snapshot();
    let insights = views::upcoming(&snapshot, INSIGHT_COUNT)
        .into_iter()
        .map(|b| InsightCard {
            id: b.id.clone(),
            customer_name: b.customer_name.clone(),
            date: b.date.clone(),
            time: b.time.clone(),
            lead_quality: b.lead_quality,
            ai_summary: b.ai_summary.clone(),
            analyzing: state.enricher.is_analyzing(&b.id),
        })
        .collect();

    Ok(Json(DashboardResponse {
        stats: views::stats(&snapshot),
        insights,
    }))
}
