use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bokasmidigt::config::AppConfig;
use bokasmidigt::db::SqliteKv;
use bokasmidigt::handlers;
use bokasmidigt::services::ai::groq::GroqProvider;
use bokasmidigt::services::ai::lead::LlmLeadAnalyzer;
use bokasmidigt::services::ai::ollama::OllamaProvider;
use bokasmidigt::services::ai::LlmProvider;
use bokasmidigt::services::enrichment::LeadEnricher;
use bokasmidigt::services::store::BookingStore;
use bokasmidigt::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let kv = SqliteKv::open(&config.database_url)?;
    let (events_tx, _) = broadcast::channel(256);
    let store = Arc::new(BookingStore::new(Box::new(kv), events_tx));

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(!config.groq_api_key.is_empty(), "GROQ_API_KEY must be set when LLM_PROVIDER=groq");
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(config.groq_api_key.clone(), config.groq_model.clone()))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {}, model: {})", config.ollama_url, config.ollama_model);
            Box::new(OllamaProvider::new(config.ollama_url.clone(), config.ollama_model.clone()))
        }
    };
    let analyzer = Arc::new(LlmLeadAnalyzer::new(llm));

    let state = Arc::new(AppState {
        config: config.clone(),
        enricher: LeadEnricher::new(Arc::clone(&store), analyzer),
        store,
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/status",
            post(handlers::bookings::update_status),
        )
        .route("/api/dashboard", get(handlers::bookings::dashboard))
        .route("/api/calendar", get(handlers::calendar::month_grid))
        .route(
            "/api/calendar/:booking_id",
            get(handlers::calendar::download_ics),
        )
        .route("/api/events", get(handlers::events::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
    state.shutdown();
}
