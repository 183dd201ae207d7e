//! JWKS fetch-and-cache, shared by every JOSE-based join method. Keyed by
//! issuer URL, cached for 5 minutes. Generic OIDC, Kubernetes service
//! account tokens, Azure attested-data, and GCP instance-identity JWTs
//! all route through this.

use dashmap::DashMap;
use jsonwebtoken::jwk::JwkSet;
use meridian_core::{ErrorKind, MeridianError};
use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(300);

static CACHE: Lazy<DashMap<String, (JwkSet, Instant)>> = Lazy::new(DashMap::new);

pub async fn fetch_jwks(client: &reqwest::Client, issuer: &str) -> Result<JwkSet, MeridianError> {
    if let Some(entry) = CACHE.get(issuer) {
        if entry.1.elapsed() < CACHE_TTL {
            return Ok(entry.0.clone());
        }
    }

    let discovery_url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
    let discovery: serde_json::Value = client
        .get(&discovery_url)
        .send()
        .await
        .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "failed to fetch OIDC discovery document", e))?
        .json()
        .await
        .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "malformed OIDC discovery document", e))?;

    let jwks_uri = discovery
        .get("jwks_uri")
        .and_then(|v| v.as_str())
        .ok_or_else(|| MeridianError::new(ErrorKind::Unavailable, "discovery document has no jwks_uri"))?;

    let jwks: JwkSet = client
        .get(jwks_uri)
        .send()
        .await
        .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "failed to fetch JWKS", e))?
        .json()
        .await
        .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "malformed JWKS document", e))?;

    CACHE.insert(issuer.to_string(), (jwks.clone(), Instant::now()));
    Ok(jwks)
}

pub fn decoding_key_for(jwks: &JwkSet, kid: Option<&str>) -> Result<jsonwebtoken::DecodingKey, MeridianError> {
    let jwk = match kid {
        Some(kid) => jwks
            .find(kid)
            .ok_or_else(|| MeridianError::new(ErrorKind::Unauthenticated, format!("no JWK matching kid {kid}")))?,
        None => jwks
            .keys
            .first()
            .ok_or_else(|| MeridianError::new(ErrorKind::Unauthenticated, "JWKS has no keys"))?,
    };
    jsonwebtoken::DecodingKey::from_jwk(jwk)
        .map_err(|e| MeridianError::with_source(ErrorKind::Unauthenticated, "unsupported JWK", e))
}
