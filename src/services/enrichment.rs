use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::{AbortHandle, JoinHandle};

use crate::models::{Booking, BookingEvent, BookingPatch, LeadAnalysis};
use crate::services::ai::lead::LeadAnalyzer;
use crate::services::store::BookingStore;

type InFlight = Arc<Mutex<HashMap<String, AbortHandle>>>;

/// Runs lead analysis for new bookings in the background. While a booking is
/// being analyzed its id is listed as in flight.
pub struct LeadEnricher {
    store: Arc<BookingStore>,
    analyzer: Arc<dyn LeadAnalyzer>,
    in_flight: InFlight,
}

impl LeadEnricher {
    pub fn new(store: Arc<BookingStore>, analyzer: Arc<dyn LeadAnalyzer>) -> Self {
        Self {
            store,
            analyzer,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts analysis for `booking`. Returns `None` when there is nothing to
    /// do: no notes, an analysis already running, or a closed store.
    pub fn spawn(&self, booking: Booking) -> Option<JoinHandle<()>> {
        if !booking.has_notes() {
            tracing::debug!(booking_id = %booking.id, "no notes, skipping lead analysis");
            return None;
        }
        // Held until the handle is registered so the task can't clear its
        // marker before it is set, and so `shutdown` can't drain in between.
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if self.store.is_closed() {
            return None;
        }
        if in_flight.contains_key(&booking.id) {
            tracing::debug!(booking_id = %booking.id, "lead analysis already running");
            return None;
        }

        let id = booking.id.clone();
        self.store.publish(BookingEvent::AnalysisStarted {
            booking_id: id.clone(),
        });
        let handle = tokio::spawn(run_analysis(
            Arc::clone(&self.store),
            Arc::clone(&self.analyzer),
            Arc::clone(&self.in_flight),
            booking,
        ));
        in_flight.insert(id, handle.abort_handle());

        Some(handle)
    }

    pub fn is_analyzing(&self, id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn in_flight_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Closes the store, then aborts every outstanding analysis and clears
    /// the markers. No analysis can start once this returns.
    pub fn shutdown(&self) {
        self.store.close();
        let pending: Vec<(String, AbortHandle)> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        for (id, handle) in &pending {
            handle.abort();
            tracing::debug!(booking_id = %id, "aborted lead analysis");
        }
        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "cancelled outstanding lead analyses");
        }
    }
}

async fn run_analysis(
    store: Arc<BookingStore>,
    analyzer: Arc<dyn LeadAnalyzer>,
    in_flight: InFlight,
    booking: Booking,
) {
    let analysis = match analyzer.analyze(&booking).await {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!(booking_id = %booking.id, error = %e, "lead analysis failed, using fallback");
            LeadAnalysis::fallback()
        }
    };

    tracing::info!(
        booking_id = %booking.id,
        quality = analysis.quality.as_str(),
        "lead analysis finished"
    );
    store.update_field(&booking.id, BookingPatch::analysis(analysis));

    in_flight
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&booking.id);
    store.publish(BookingEvent::AnalysisFinished {
        booking_id: booking.id,
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::{broadcast, Notify};

    use super::*;
    use crate::db::SqliteKv;
    use crate::models::lead::FALLBACK_SUMMARY;
    use crate::models::{BookingDraft, LeadQuality, Representative};

    struct ScriptedAnalyzer {
        calls: AtomicUsize,
        result: Option<LeadAnalysis>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedAnalyzer {
        fn replying(summary: &str, quality: LeadQuality) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Some(LeadAnalysis {
                    summary: summary.to_string(),
                    quality,
                }),
                gate: None,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: None,
                gate: None,
            }
        }
    }

    #[async_trait]
    impl LeadAnalyzer for ScriptedAnalyzer {
        async fn analyze(&self, _booking: &Booking) -> anyhow::Result<LeadAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.result
                .clone()
                .ok_or_else(|| anyhow::anyhow!("service unavailable"))
        }
    }

    fn store() -> Arc<BookingStore> {
        let (tx, _) = broadcast::channel(64);
        Arc::new(BookingStore::new(
            Box::new(SqliteKv::open(":memory:").unwrap()),
            tx,
        ))
    }

    fn create(store: &BookingStore, notes: &str) -> Booking {
        store.create(BookingDraft {
            customer_name: Some("Anna".to_string()),
            phone: Some("0701234567".to_string()),
            date: Some("2025-03-10".to_string()),
            time: Some("14:00".to_string()),
            representative: Some(Representative::Niclas),
            notes: Some(notes.to_string()),
            ..BookingDraft::default()
        })
    }

    #[tokio::test]
    async fn test_empty_notes_skip_analysis() {
        let store = store();
        let analyzer = Arc::new(ScriptedAnalyzer::replying("x", LeadQuality::Hot));
        let enricher = LeadEnricher::new(Arc::clone(&store), analyzer.clone());

        let booking = create(&store, "");
        assert!(enricher.spawn(booking.clone()).is_none());

        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
        assert!(!enricher.is_analyzing(&booking.id));
        let stored = store.get(&booking.id).unwrap();
        assert!(stored.lead_quality.is_none());
        assert!(stored.ai_summary.is_none());
    }

    #[tokio::test]
    async fn test_successful_analysis_is_stored_and_marker_cleared() {
        let store = store();
        let analyzer = Arc::new(ScriptedAnalyzer::replying("Stark köpsignal.", LeadQuality::Hot));
        let enricher = LeadEnricher::new(Arc::clone(&store), analyzer.clone());

        let booking = create(&store, "Intresserad av premium-paket");
        let handle = enricher.spawn(booking.clone()).unwrap();
        assert!(enricher.is_analyzing(&booking.id));

        handle.await.unwrap();

        let stored = store.get(&booking.id).unwrap();
        assert_eq!(stored.lead_quality, Some(LeadQuality::Hot));
        assert_eq!(stored.ai_summary.as_deref(), Some("Stark köpsignal."));
        assert!(!enricher.is_analyzing(&booking.id));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_analysis_stores_fallback() {
        let store = store();
        let enricher = LeadEnricher::new(Arc::clone(&store), Arc::new(ScriptedAnalyzer::failing()));

        let booking = create(&store, "Ring tillbaka");
        enricher.spawn(booking.clone()).unwrap().await.unwrap();

        let stored = store.get(&booking.id).unwrap();
        assert_eq!(stored.lead_quality, Some(LeadQuality::Cold));
        assert_eq!(stored.ai_summary.as_deref(), Some(FALLBACK_SUMMARY));
        assert!(!enricher.is_analyzing(&booking.id));
    }

    #[tokio::test]
    async fn test_second_spawn_for_same_booking_is_refused() {
        let store = store();
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(ScriptedAnalyzer {
            gate: Some(Arc::clone(&gate)),
            ..ScriptedAnalyzer::replying("Ok.", LeadQuality::Warm)
        });
        let enricher = LeadEnricher::new(Arc::clone(&store), analyzer.clone());

        let booking = create(&store, "Offert");
        let handle = enricher.spawn(booking.clone()).unwrap();
        assert!(enricher.spawn(booking.clone()).is_none());
        assert_eq!(enricher.in_flight_ids(), vec![booking.id.clone()]);

        gate.notify_one();
        handle.await.unwrap();
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        assert!(enricher.in_flight_ids().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_hanging_analysis() {
        let store = store();
        let analyzer = Arc::new(ScriptedAnalyzer {
            gate: Some(Arc::new(Notify::new())),
            ..ScriptedAnalyzer::replying("Aldrig.", LeadQuality::Hot)
        });
        let enricher = LeadEnricher::new(Arc::clone(&store), analyzer);

        let booking = create(&store, "Hänger sig");
        let handle = enricher.spawn(booking.clone()).unwrap();

        enricher.shutdown();

        assert!(store.is_closed());
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!enricher.is_analyzing(&booking.id));
        assert!(store.get(&booking.id).unwrap().lead_quality.is_none());
        assert!(enricher.spawn(booking).is_none());
    }

    /// Holds each analysis until its booking's gate opens. The summary echoes
    /// the notes so results can be told apart.
    struct PerBookingGates {
        gates: HashMap<String, Arc<Notify>>,
    }

    #[async_trait]
    impl LeadAnalyzer for PerBookingGates {
        async fn analyze(&self, booking: &Booking) -> anyhow::Result<LeadAnalysis> {
            if let Some(gate) = self.gates.get(&booking.notes) {
                gate.notified().await;
            }
            Ok(LeadAnalysis {
                summary: booking.notes.clone(),
                quality: LeadQuality::Warm,
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_analyses_finish_in_any_order() {
        let store = store();
        let first_gate = Arc::new(Notify::new());
        let second_gate = Arc::new(Notify::new());
        let analyzer = Arc::new(PerBookingGates {
            gates: HashMap::from([
                ("Först".to_string(), Arc::clone(&first_gate)),
                ("Sedan".to_string(), Arc::clone(&second_gate)),
            ]),
        });
        let enricher = LeadEnricher::new(Arc::clone(&store), analyzer);

        let first = create(&store, "Först");
        let second = create(&store, "Sedan");
        let first_handle = enricher.spawn(first.clone()).unwrap();
        let second_handle = enricher.spawn(second.clone()).unwrap();

        let mut both = vec![first.id.clone(), second.id.clone()];
        both.sort();
        assert_eq!(enricher.in_flight_ids(), both);

        second_gate.notify_one();
        second_handle.await.unwrap();

        assert_eq!(store.get(&second.id).unwrap().ai_summary.as_deref(), Some("Sedan"));
        assert!(store.get(&first.id).unwrap().ai_summary.is_none());
        assert!(enricher.is_analyzing(&first.id));
        assert!(!enricher.is_analyzing(&second.id));

        first_gate.notify_one();
        first_handle.await.unwrap();

        assert_eq!(store.get(&first.id).unwrap().ai_summary.as_deref(), Some("Först"));
        assert_eq!(store.get(&second.id).unwrap().ai_summary.as_deref(), Some("Sedan"));
        assert!(enricher.in_flight_ids().is_empty());
    }

    #[tokio::test]
    async fn test_markers_are_published() {
        let store = store();
        let mut rx = store.subscribe();
        let enricher = LeadEnricher::new(
            Arc::clone(&store),
            Arc::new(ScriptedAnalyzer::replying("Ok.", LeadQuality::Warm)),
        );

        let booking = create(&store, "Offert");
        enricher.spawn(booking.clone()).unwrap().await.unwrap();

        let kinds: Vec<&'static str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.name())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "booking_created",
                "analysis_started",
                "booking_updated",
                "analysis_finished"
            ]
        );
    }
}
