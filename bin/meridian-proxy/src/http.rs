//! The Proxy's HTTP surface: a readiness probe reporting reverse-tunnel
//! fabric health, mirroring `meridian-auth`'s `/readyz`.

use crate::state::ProxyState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new().route("/readyz", get(readyz)).with_state(state)
}

async fn readyz(State(state): State<Arc<ProxyState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "connected_agents": state.hub.connected_count() })),
    )
}
