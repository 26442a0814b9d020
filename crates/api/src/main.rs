use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tradestation_core::domain::allocation::{Allocation, RiskLevel};
use tradestation_core::domain::prompt;
use tradestation_core::domain::snapshot::MarketSnapshot;
use tradestation_core::ingest::{self, QuoteProvider};
use tradestation_core::llm::TextGenerator;

mod sessions;

use sessions::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tradestation_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    // Without the key there is nothing useful to serve.
    if let Err(e) = settings.require_gemini_api_key() {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "refusing to start");
        return Err(e);
    }

    let llm = tradestation_core::llm::gemini::GeminiClient::from_settings(&settings)?;
    let quotes = tradestation_core::ingest::yahoo::YahooQuoteProvider::from_settings(&settings)?;

    let state = AppState {
        llm: Arc::new(llm),
        quotes: Arc::new(quotes),
        watchlist: Arc::new(settings.watchlist.clone()),
        scan_headlines: settings.scan_headlines,
        sessions: session_store_from_env(),
    };

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, watchlist = ?settings.watchlist, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn session_store_from_env() -> SessionStore {
    let idle_ttl = std::env::var("SESSION_IDLE_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(std::time::Duration::from_secs)
        .unwrap_or(sessions::DEFAULT_IDLE_TTL);
    let max_sessions = std::env::var("MAX_SESSIONS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(sessions::DEFAULT_MAX_SESSIONS);
    tracing::info!(idle_ttl_secs = idle_ttl.as_secs(), max_sessions, "session limits");
    SessionStore::new(idle_ttl, max_sessions)
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/watchlist", get(get_watchlist))
        .route("/risk-levels", get(get_risk_levels))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", delete(delete_session))
        .route("/sessions/:id/scan", post(scan_markets))
        .route("/sessions/:id/ask", post(ask_analyst))
        .route("/charts/:ticker", get(get_price_chart))
        .route("/strategy", post(generate_strategy))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    llm: Arc<dyn TextGenerator>,
    quotes: Arc<dyn QuoteProvider>,
    watchlist: Arc<Vec<String>>,
    scan_headlines: usize,
    sessions: SessionStore,
}

#[derive(Debug, Serialize)]
struct SessionCreated {
    session_id: Uuid,
}

#[derive(Debug, Serialize)]
struct ScanResponse {
    market_data: String,
    snapshot: MarketSnapshot,
    commentary: String,
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    answer: String,
}

#[derive(Debug, Deserialize)]
struct StrategyRequest {
    investment: f64,
    risk: RiskLevel,
}

#[derive(Debug, Serialize)]
struct AssetAmount {
    asset: String,
    amount: f64,
}

#[derive(Debug, Serialize)]
struct StrategyResponse {
    investment: f64,
    allocation: Allocation,
    total_percentage: u32,
    amounts: Vec<AssetAmount>,
    chart_svg: String,
    advice: String,
}

async fn get_watchlist(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.watchlist.as_ref().clone())
}

async fn get_risk_levels() -> Json<Vec<Allocation>> {
    Json(RiskLevel::ALL.iter().map(|level| level.allocation()).collect())
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let session = state.sessions.create().await;
    let sessions = state.sessions.len().await;
    tracing::info!(session_id = %session.id, sessions, "session created");
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id,
        }),
    )
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.sessions.remove(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn scan_markets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanResponse>, StatusCode> {
    if !state.sessions.contains(id).await {
        return Err(StatusCode::NOT_FOUND);
    }

    let snapshot =
        ingest::scan_watchlist(state.quotes.as_ref(), &state.watchlist, state.scan_headlines).await;
    let market_data = snapshot.display();

    if !state.sessions.record_scan(id, snapshot.clone()).await {
        return Err(StatusCode::NOT_FOUND);
    }

    tracing::info!(session_id = %id, provider = ?state.llm.provider(), "market scan recorded");
    let commentary = state
        .llm
        .generate(&prompt::market_summary_prompt(&market_data))
        .await;

    Ok(Json(ScanResponse {
        market_data,
        snapshot,
        commentary,
    }))
}

async fn ask_analyst(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, StatusCode> {
    let context = state
        .sessions
        .market_context(id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    if let Err(e) = prompt::require_question(&req.question) {
        tracing::debug!(session_id = %id, error = %e, "rejected analyst question");
        return Err(StatusCode::BAD_REQUEST);
    }

    tracing::info!(session_id = %id, provider = ?state.llm.provider(), "analyst question");
    let answer = state
        .llm
        .generate(&prompt::analyst_prompt(context.as_deref(), &req.question))
        .await;
    Ok(Json(AskResponse { answer }))
}

async fn get_price_chart(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let history = ingest::fetch_history(state.quotes.as_ref(), &ticker)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::warn!(%ticker, error = %e, "price history unavailable");
            StatusCode::BAD_GATEWAY
        })?;

    let svg = tradestation_core::charts::render_price_chart(&ticker, &history).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

async fn generate_strategy(
    State(state): State<AppState>,
    Json(req): Json<StrategyRequest>,
) -> Result<Json<StrategyResponse>, StatusCode> {
    if !req.investment.is_finite() || req.investment < 0.0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let allocation = req.risk.allocation();
    let chart_svg = tradestation_core::charts::render_allocation_pie(&allocation).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    tracing::info!(risk = %req.risk, provider = ?state.llm.provider(), "strategy requested");
    let advice = state
        .llm
        .generate(&prompt::strategy_prompt(req.investment, &allocation))
        .await;

    let amounts = allocation
        .split(req.investment)
        .into_iter()
        .map(|(asset, amount)| AssetAmount { asset, amount })
        .collect();

    Ok(Json(StrategyResponse {
        investment: req.investment,
        total_percentage: allocation.total(),
        allocation,
        amounts,
        chart_svg,
        advice,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &tradestation_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
