use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::KvStore;
use crate::models::booking::DEFAULT_TIME;
use crate::models::lead::MISSING_SUMMARY;
use crate::models::{
    Booking, BookingDraft, BookingEvent, BookingPatch, BookingStatus, LeadQuality, Representative,
};

pub const STORAGE_KEY: &str = "bookings";
pub const SCHEMA_VERSION: u64 = 2;

#[derive(Serialize)]
struct PersistedBookings<'a> {
    version: u64,
    bookings: &'a [Booking],
}

/// Owner of the booking collection.
///
/// The collection is an immutable snapshot that every mutation replaces
/// wholesale, so readers holding a snapshot never observe a half-applied
/// change. Mutations hold the write lock across the persist, which keeps the
/// persisted blob in the same order as the in-memory changes.
pub struct BookingStore {
    kv: Box<dyn KvStore>,
    /// Envelope version written back on persist. Never lowered, so a blob
    /// from a newer build keeps its version.
    version: u64,
    bookings: RwLock<Arc<Vec<Booking>>>,
    events: broadcast::Sender<BookingEvent>,
    closed: AtomicBool,
}

impl BookingStore {
    pub fn new(kv: Box<dyn KvStore>, events: broadcast::Sender<BookingEvent>) -> Self {
        let stored = read_blob(kv.as_ref());
        tracing::info!(count = stored.bookings.len(), version = stored.version, "loaded bookings");
        Self {
            kv,
            version: stored.version.max(SCHEMA_VERSION),
            bookings: RwLock::new(Arc::new(stored.bookings)),
            events,
            closed: AtomicBool::new(false),
        }
    }

    /// Reads the persisted collection. Absent or unreadable data is treated
    /// as an empty collection.
    pub fn load(&self) -> Vec<Booking> {
        read_blob(self.kv.as_ref()).bookings
    }

    pub fn persist(&self, bookings: &[Booking]) -> anyhow::Result<()> {
        let blob = serde_json::to_string(&PersistedBookings {
            version: self.version,
            bookings,
        })
        .context("failed to serialize bookings")?;
        self.kv
            .set(STORAGE_KEY, &blob)
            .context("failed to write bookings")
    }

    pub fn snapshot(&self) -> Arc<Vec<Booking>> {
        Arc::clone(&self.bookings.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get(&self, id: &str) -> Option<Booking> {
        self.snapshot().iter().find(|b| b.id == id).cloned()
    }

    /// Completes the draft with defaults and puts it at the head of the
    /// collection.
    pub fn create(&self, draft: BookingDraft) -> Booking {
        let booking = build_booking(draft, Local::now().date_naive());

        let mut guard = self.bookings.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.push(booking.clone());
        next.extend(guard.iter().cloned());
        self.commit(&mut guard, next);
        drop(guard);

        tracing::info!(booking_id = %booking.id, date = %booking.date, time = %booking.time, "booking created");
        self.publish(BookingEvent::Created {
            booking: booking.clone(),
        });
        booking
    }

    /// Merges `patch` into the booking with `id`. Unknown ids and a closed
    /// store are ignored.
    pub fn update_field(&self, id: &str, patch: BookingPatch) -> Option<Booking> {
        if self.is_closed() {
            tracing::debug!(booking_id = %id, "store closed, dropping update");
            return None;
        }

        let mut guard = self.bookings.write().unwrap_or_else(PoisonError::into_inner);
        let Some(idx) = guard.iter().position(|b| b.id == id) else {
            tracing::debug!(booking_id = %id, "update for unknown booking ignored");
            return None;
        };

        let mut next = (**guard).clone();
        patch.apply(&mut next[idx]);
        let updated = next[idx].clone();
        self.commit(&mut guard, next);
        drop(guard);

        self.publish(BookingEvent::Updated {
            booking: updated.clone(),
        });
        Some(updated)
    }

    pub fn set_status(&self, id: &str, status: BookingStatus) -> Option<Booking> {
        self.update_field(id, BookingPatch::status(status))
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: BookingEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn commit(&self, current: &mut Arc<Vec<Booking>>, next: Vec<Booking>) {
        if let Err(e) = self.persist(&next) {
            tracing::error!(error = %format!("{e:#}"), "failed to persist bookings");
        }
        *current = Arc::new(next);
    }
}

fn build_booking(draft: BookingDraft, today: NaiveDate) -> Booking {
    let draft = draft.normalized();
    Booking {
        id: Uuid::new_v4().to_string(),
        customer_name: draft.customer_name.unwrap_or_default(),
        phone: draft.phone.unwrap_or_default(),
        email: draft.email.unwrap_or_default(),
        date: draft
            .date
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
        time: draft.time.unwrap_or_else(|| DEFAULT_TIME.to_string()),
        representative: draft.representative.unwrap_or_default(),
        notes: draft.notes.unwrap_or_default(),
        status: BookingStatus::Pending,
        lead_quality: None,
        ai_summary: None,
        extra: Default::default(),
    }
}

struct StoredBookings {
    version: u64,
    bookings: Vec<Booking>,
}

fn read_blob(kv: &dyn KvStore) -> StoredBookings {
    let empty = || StoredBookings {
        version: SCHEMA_VERSION,
        bookings: Vec::new(),
    };

    let raw = match kv.get(STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return empty(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read bookings, starting empty");
            return empty();
        }
    };

    decode_bookings(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "unreadable bookings blob, starting empty");
        empty()
    })
}

/// Accepts the current envelope as well as the legacy bare array.
fn decode_bookings(raw: &str) -> anyhow::Result<StoredBookings> {
    let data: serde_json::Value = serde_json::from_str(raw).context("bookings blob is not JSON")?;

    match data {
        serde_json::Value::Array(records) => {
            tracing::info!(count = records.len(), "migrating legacy bookings blob");
            Ok(StoredBookings {
                version: 1,
                bookings: migrate_records(records),
            })
        }
        serde_json::Value::Object(mut envelope) => {
            let version = envelope
                .get("version")
                .and_then(|v| v.as_u64())
                .unwrap_or(1);
            if version > SCHEMA_VERSION {
                tracing::warn!(version, "bookings blob is newer than this build, reading best-effort");
            }
            match envelope.remove("bookings") {
                Some(serde_json::Value::Array(records)) => Ok(StoredBookings {
                    version,
                    bookings: migrate_records(records),
                }),
                _ => anyhow::bail!("bookings envelope has no bookings array"),
            }
        }
        _ => anyhow::bail!("unrecognized bookings blob"),
    }
}

fn migrate_records(records: Vec<serde_json::Value>) -> Vec<Booking> {
    records.into_iter().filter_map(migrate_record).collect()
}

/// Reads one stored record, filling whatever is missing or unreadable.
/// Only a record without an id is skipped, since nothing could refer to it.
fn migrate_record(record: serde_json::Value) -> Option<Booking> {
    let serde_json::Value::Object(mut fields) = record else {
        tracing::warn!("skipping booking record that is not an object");
        return None;
    };

    let Some(id) = take_text(&mut fields, "id").filter(|id| !id.trim().is_empty()) else {
        tracing::warn!("skipping booking record without an id");
        return None;
    };

    let representative = take_text(&mut fields, "representative")
        .and_then(|r| serde_json::from_value::<Representative>(r.into()).ok())
        .unwrap_or_default();
    let status = take_text(&mut fields, "status")
        .and_then(|s| serde_json::from_value::<BookingStatus>(s.into()).ok())
        .unwrap_or_default();

    // Summary and quality are kept only as a pair.
    let quality = take_text(&mut fields, "leadQuality");
    let summary = take_text(&mut fields, "aiSummary").filter(|s| !s.trim().is_empty());
    let (lead_quality, ai_summary) = match (quality, summary) {
        (Some(token), summary) => match LeadQuality::parse(&token) {
            Some(quality) => (
                Some(quality),
                Some(summary.unwrap_or_else(|| MISSING_SUMMARY.to_string())),
            ),
            None => {
                tracing::warn!(booking_id = %id, quality = %token, "unknown stored lead quality, clearing analysis");
                (None, None)
            }
        },
        (None, Some(summary)) => (Some(LeadQuality::default()), Some(summary)),
        (None, None) => (None, None),
    };

    Some(Booking {
        customer_name: take_text(&mut fields, "customerName").unwrap_or_default(),
        phone: take_text(&mut fields, "phone").unwrap_or_default(),
        email: take_text(&mut fields, "email").unwrap_or_default(),
        date: take_text(&mut fields, "date").unwrap_or_default(),
        time: take_text(&mut fields, "time").unwrap_or_default(),
        notes: take_text(&mut fields, "notes").unwrap_or_default(),
        id,
        representative,
        status,
        lead_quality,
        ai_summary,
        extra: fields,
    })
}

/// Removes `key` and reads it as text. Numbers read as their decimal form.
fn take_text(fields: &mut serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
