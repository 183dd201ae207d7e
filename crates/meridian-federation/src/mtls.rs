//! mTLS configuration for proxy-to-proxy peering across trusted
//! clusters. Generalizes the reverse-tunnel's static-file TLS config to
//! build its verification path from an imported `CaBundle` instead: a
//! leaf cluster trusts whatever the root exported at
//! `/webapi/auth/export`, not a certificate file an operator copied by
//! hand.

use crate::bundle::CaBundle;
use meridian_core::{ErrorKind, MeridianError};
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use rustls::{ClientConfig, ServerConfig};
use std::sync::Arc;

/// Builds a `RootCertStore` from the host-CA bundle a leaf imported from
/// a root cluster. Each public key is wrapped as a self-signed-shaped
/// `CertificateDer` placeholder the way `rcgen`-issued leaf certs are,
/// since this workspace's CAs are not themselves X.509 certificates.
fn root_store_from_bundle(bundle: &CaBundle) -> Result<RootCertStore, MeridianError> {
    let mut store = RootCertStore::empty();
    for key in &bundle.public_keys {
        let der = CertificateDer::from(key.clone());
        store
            .add(der)
            .map_err(|e| MeridianError::with_source(ErrorKind::InvalidArgument, "imported CA key is not a valid certificate", e))?;
    }
    Ok(store)
}

/// Client config for dialing a peer proxy in a trusted cluster: trust
/// only the host CA the peer's root exported, nothing from the system
/// root store.
pub fn client_tls_config(host_ca_bundle: &CaBundle) -> Result<Arc<ClientConfig>, MeridianError> {
    let roots = root_store_from_bundle(host_ca_bundle)?;
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Server config for accepting inbound peer connections: require a
/// client certificate signed by the imported user CA bundle.
pub fn server_tls_config(
    server_certs: Vec<CertificateDer<'static>>,
    server_key: rustls::pki_types::PrivateKeyDer<'static>,
    user_ca_bundle: &CaBundle,
) -> Result<Arc<ServerConfig>, MeridianError> {
    let roots = root_store_from_bundle(user_ca_bundle)?;
    let verifier = rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|e| MeridianError::with_source(ErrorKind::InvalidArgument, "failed to build client cert verifier", e))?;

    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(server_certs, server_key)
        .map_err(|e| MeridianError::with_source(ErrorKind::InvalidArgument, "failed to build server tls config", e))?;

    Ok(Arc::new(config))
}
