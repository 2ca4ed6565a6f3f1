//! HTTP API over the event index.
//!
//! Routes are served at the root and again under `/api`, `/index` and
//! `/api/index`, the prefixes the front-end has been deployed behind.

use crate::error::LookupError;
use crate::index::{EventEntry, EventIndex, Scored};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tower_http::cors::{Any, CorsLayer};

/// Shared handler state: the current index and where it was loaded from.
pub struct AppState {
    index: RwLock<Arc<EventIndex>>,
    assets: PathBuf,
}

impl AppState {
    pub fn new(index: EventIndex, assets: impl Into<PathBuf>) -> Self {
        Self {
            index: RwLock::new(Arc::new(index)),
            assets: assets.into(),
        }
    }

    /// The index in use right now.
    pub fn index(&self) -> Arc<EventIndex> {
        match self.index.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Rebuild from disk and swap in. The old index stays on failure.
    pub fn reload(&self) -> Result<usize, LookupError> {
        let fresh = Arc::new(EventIndex::load(&self.assets)?);
        let count = fresh.len();
        match self.index.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        Ok(count)
    }
}

/// Build the router with every prefix mounted.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes: Router<Arc<AppState>> = Router::new()
        .route("/health", get(health))
        .route("/events", get(list_events))
        .route("/event_by_name", get(event_by_name))
        .route("/reload", post(reload));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes.clone())
        .nest("/index", routes.clone())
        .nest("/api/index", routes)
        .layer(cors)
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("lookup API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "events": state.index().len(),
    }))
}

#[derive(Serialize)]
struct EventList {
    events: Vec<String>,
}

async fn list_events(State(state): State<Arc<AppState>>) -> Json<EventList> {
    let index = state.index();
    Json(EventList {
        events: index.names().map(str::to_string).collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub event_name: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub min_score: f64,
}

fn default_limit() -> usize {
    5
}

#[derive(Debug, Serialize)]
pub struct TopMatch {
    pub event_name: String,
    pub score: f64,
    pub data: EventEntry,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    #[serde(rename = "match")]
    pub top: TopMatch,
    pub other_matches: Vec<Scored>,
}

async fn event_by_name(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Result<Json<LookupResponse>, LookupError> {
    if !(0.0..=100.0).contains(&params.min_score) {
        return Err(LookupError::InvalidParam(format!(
            "min_score must be between 0 and 100, got {}",
            params.min_score
        )));
    }

    let index = state.index();
    let mut hits = index
        .search(&params.event_name, params.limit, params.min_score)
        .into_iter();
    let best = hits.next().ok_or(LookupError::NotFound)?;
    let data = index
        .get(&best.event_name)
        .cloned()
        .ok_or(LookupError::NotFound)?;

    Ok(Json(LookupResponse {
        top: TopMatch {
            event_name: best.event_name,
            score: best.score,
            data,
        },
        other_matches: hits.collect(),
    }))
}

async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<Value>, LookupError> {
    let events = state.reload()?;
    tracing::info!(events, "event index reloaded");
    Ok(Json(serde_json::json!({ "status": "reloaded", "events": events })))
}
