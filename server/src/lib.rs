//! Shared service wiring and the admin HTTP API for the Folio server.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use folio_storage::EntityStore;
use folio_sync::{MutationEngine, RateLimiter, TopicRegistry};
use folio_types::{Folder, Subscription};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

pub mod connection;

/// Process-wide services, constructed once in `main` and shared by every
/// connection and the admin API.
pub struct Services {
    pub store: Arc<EntityStore>,
    pub topics: Arc<TopicRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub engine: MutationEngine,
}

impl Services {
    pub fn new(store: Arc<EntityStore>) -> Self {
        let topics = Arc::new(TopicRegistry::new());
        let limiter = Arc::new(RateLimiter::new());
        let engine = MutationEngine::new(store.clone(), topics.clone());
        Self {
            store,
            topics,
            limiter,
            engine,
        }
    }
}

// ── Admin HTTP API ───────────────────────────────────────────────

/// State for the admin router. Read-mostly; the one mutation is the
/// administrative unblock.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<EntityStore>,
    pub limiter: Arc<RateLimiter>,
}

/// One rate-limiter record as exposed over HTTP.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SourceRecord {
    pub address: IpAddr,
    pub count: u32,
    pub blocked: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UnblockRequest {
    pub address: IpAddr,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UnblockResponse {
    pub unblocked: bool,
}

async fn list_subscriptions(
    State(state): State<AdminState>,
) -> Result<Json<Vec<Subscription>>, StatusCode> {
    state.store.all_subscriptions().map(Json).map_err(|err| {
        warn!(%err, "subscription dump failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn list_sources(State(state): State<AdminState>) -> Json<Vec<SourceRecord>> {
    let records = state
        .limiter
        .snapshot()
        .into_iter()
        .map(|(address, rate)| SourceRecord {
            address,
            count: rate.count,
            blocked: rate.blocked,
        })
        .collect();
    Json(records)
}

async fn unblock_source(
    State(state): State<AdminState>,
    Json(req): Json<UnblockRequest>,
) -> Json<UnblockResponse> {
    Json(UnblockResponse {
        unblocked: state.limiter.unblock(&req.address),
    })
}

async fn list_folders(State(state): State<AdminState>) -> Result<Json<Vec<Folder>>, StatusCode> {
    state.store.all_folders().map(Json).map_err(|err| {
        warn!(%err, "folder dump failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Build the admin HTTP router with the given state.
pub fn build_router(state: AdminState) -> Router {
    Router::new()
        .route("/api/v1/subscriptions", get(list_subscriptions))
        .route("/api/v1/sources", get(list_sources))
        .route("/api/v1/sources/unblock", post(unblock_source))
        .route("/api/v1/folders", get(list_folders))
        .with_state(state)
}
