//! The Auth Service's HTTP surface: OIDC discovery/JWKS (so other
//! clusters and workloads can verify JWTs this cluster issues), CA
//! bundle export for federation, and a readiness probe.

use crate::state::AuthState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use meridian_core::model::CaType;
use serde_json::json;
use std::sync::Arc;

pub fn router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/.well-known/jwks.json", get(jwks))
        .route("/.well-known/openid-configuration", get(openid_configuration))
        .route("/webapi/auth/export/:ca_type", get(export_ca))
        .route("/readyz", get(readyz))
        .with_state(state)
}

async fn jwks(State(state): State<Arc<AuthState>>) -> impl IntoResponse {
    let ca_lock = match state.ca(CaType::Jwt) {
        Ok(lock) => lock,
        Err(_) => return (StatusCode::NOT_FOUND, Json(json!({"keys": []}))),
    };
    let ca = ca_lock.read().expect("CA lock poisoned");

    let keys: Vec<_> = ca
        .exported_public_keys()
        .into_iter()
        .map(|key| {
            json!({
                "kty": "OKP",
                "crv": "Ed25519",
                "use": "sig",
                "alg": "EdDSA",
                "x": base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(key),
            })
        })
        .collect();

    (StatusCode::OK, Json(json!({ "keys": keys })))
}

async fn openid_configuration(State(_state): State<Arc<AuthState>>) -> impl IntoResponse {
    Json(json!({
        "issuer": "meridian-auth",
        "jwks_uri": "/.well-known/jwks.json",
    }))
}

async fn export_ca(State(state): State<Arc<AuthState>>, Path(ca_type): Path<String>) -> impl IntoResponse {
    let parsed = match ca_type.as_str() {
        "host" => CaType::Host,
        "user" => CaType::User,
        "db" => CaType::Db,
        "db_client" => CaType::DbClient,
        "openssh" => CaType::Openssh,
        "jwt" => CaType::Jwt,
        "saml_idp" => CaType::SamlIdp,
        "spiffe" => CaType::Spiffe,
        "oidc_idp" => CaType::OidcIdp,
        _ => return (StatusCode::BAD_REQUEST, "unknown CA type".to_string()),
    };
    let ca_lock = match state.ca(parsed) {
        Ok(lock) => lock,
        Err(_) => return (StatusCode::NOT_FOUND, "no such CA on this cluster".to_string()),
    };
    let ca = ca_lock.read().expect("CA lock poisoned");
    (StatusCode::OK, meridian_federation::export_bundle(&ca))
}

async fn readyz(State(state): State<Arc<AuthState>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "store unreachable"),
    }
}
