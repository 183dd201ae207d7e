mod grpc;
mod http;
mod state;

use grpc::TunnelServiceImpl;
use meridian_core::{ClusterConfig, ClusterContext};
use meridian_proto::tunnel::tunnel_service_server::TunnelServiceServer;
use state::ProxyState;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    meridian_core::init_tracing();

    let config = ClusterConfig::load().unwrap_or_default();
    let ctx = ClusterContext::new(
        meridian_core::ids::ClusterId::new("meridian"),
        config,
        Arc::new(meridian_core::clock::SystemClock),
    );

    let state = Arc::new(ProxyState::new(ctx));

    let grpc_addr: std::net::SocketAddr = std::env::var("MERIDIAN_PROXY_GRPC_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3024".to_string())
        .parse()?;
    let http_addr: std::net::SocketAddr = std::env::var("MERIDIAN_PROXY_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3081".to_string())
        .parse()?;

    let grpc_state = state.clone();
    let grpc_server = tonic::transport::Server::builder()
        .add_service(TunnelServiceServer::new(TunnelServiceImpl { state: grpc_state }))
        .serve(grpc_addr);

    let http_router = http::router(state.clone());
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(http_listener, http_router);

    tracing::info!(%grpc_addr, %http_addr, "meridian-proxy listening");

    tokio::select! {
        res = grpc_server => res?,
        res = http_server => res?,
    }

    Ok(())
}
