use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::entities::EntityViews;

/// Minimal read-only observability surface (SPEC_FULL.md §1/§4.8): `/health`
/// mirrors the coordinator's attach/subscribe liveness the way the presence
/// topic does for MQTT consumers, and `/entities` exposes the same three
/// entity projections MQTT-side consumers would otherwise only infer from
/// the state topic. Neither route has a write path.
#[derive(Clone)]
struct HttpState {
    entities: EntityViews,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    available: bool,
}

async fn health(State(state): State<HttpState>) -> impl IntoResponse {
    let snapshot = state.entities.snapshot();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        available: snapshot.energy.available,
    })
}

async fn entities(State(state): State<HttpState>) -> impl IntoResponse {
    Json(state.entities.snapshot())
}

pub fn router(views: EntityViews) -> Router {
    let state = HttpState { entities: views };
    Router::new()
        .route("/health", get(health))
        .route("/entities", get(entities))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
