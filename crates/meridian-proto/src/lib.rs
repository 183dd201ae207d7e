//! Generated gRPC bindings for the Auth and Tunnel services. Nothing in
//! this crate is hand-written; it only re-exports what `build.rs`
//! generates from `proto/*.proto` into `OUT_DIR`.

pub mod auth {
    tonic::include_proto!("meridian.auth.v1");
}

pub mod tunnel {
    tonic::include_proto!("meridian.tunnel.v1");
}
