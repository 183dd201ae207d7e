mod grpc;
mod http;
mod state;

use grpc::AuthServiceImpl;
use meridian_audit::{AuditBus, StdoutShipper};
use meridian_core::{ClusterContext, ClusterConfig};
use meridian_proto::auth::auth_service_server::AuthServiceServer;
use meridian_store::sled_backend::SledBackend;
use state::AuthState;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    meridian_core::init_tracing();

    let config = ClusterConfig::load().unwrap_or_default();
    let ctx = ClusterContext::new(
        meridian_core::ids::ClusterId::new("meridian"),
        config.clone(),
        Arc::new(meridian_core::clock::SystemClock),
    );

    let store_path = format!("{}/store", config.home);
    let store: Arc<dyn meridian_store::Backend> = Arc::new(SledBackend::open(&store_path)?);

    let audit = Arc::new(AuditBus::new(vec![Box::new(StdoutShipper)]));
    let state = Arc::new(AuthState::new(ctx, store, audit));

    let grpc_addr: std::net::SocketAddr = std::env::var("MERIDIAN_AUTH_GRPC_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3025".to_string())
        .parse()?;
    let http_addr: std::net::SocketAddr = std::env::var("MERIDIAN_AUTH_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3080".to_string())
        .parse()?;

    let grpc_state = state.clone();
    let grpc_server = tonic::transport::Server::builder()
        .add_service(AuthServiceServer::new(AuthServiceImpl { state: grpc_state }))
        .serve(grpc_addr);

    let http_router = http::router(state.clone());
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(http_listener, http_router);

    tracing::info!(%grpc_addr, %http_addr, "meridian-auth listening");

    tokio::select! {
        res = grpc_server => res?,
        res = http_server => res?,
    }

    Ok(())
}
