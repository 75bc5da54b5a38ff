use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::calendar::{build_grid, generate_ics, CalendarGrid, MonthAnchor};
use crate::state::AppState;

use super::check_auth;

#[derive(Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Serialize)]
pub struct MonthRef {
    year: i32,
    month: u32,
}

impl From<MonthAnchor> for MonthRef {
    fn from(anchor: MonthAnchor) -> Self {
        Self {
            year: anchor.year(),
            month: anchor.month(),
        }
    }
}

#[derive(Serialize)]
pub struct MonthResponse<'a> {
    #[serde(flatten)]
    grid: CalendarGrid<'a>,
    today: String,
    prev: MonthRef,
    next: MonthRef,
}

// GET /api/calendar?year=2024&month=2
pub async fn month_grid(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let today = Local::now().date_naive();
    let current = MonthAnchor::containing(today);
    let anchor = MonthAnchor::new(
        query.year.unwrap_or(current.year()),
        query.month.unwrap_or(current.month()),
    )
    .ok_or_else(|| AppError::Validation("invalid year or month".to_string()))?;

    let snapshot = state.store.snapshot();
    let response = MonthResponse {
        grid: build_grid(anchor, &snapshot),
        today: today.format("%Y-%m-%d").to_string(),
        prev: anchor.prev().into(),
        next: anchor.next().into(),
    };

    Ok(Json(response).into_response())
}

// GET /api/calendar/:booking_id (".ics" suffix optional)
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let booking = state
        .store
        .get(booking_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    let ics = generate_ics(&booking).ok_or_else(|| {
        AppError::Validation(format!(
            "booking {booking_id} has an unreadable date or time"
        ))
    })?;
    let filename = format!("booking-{booking_id}.ics");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}
