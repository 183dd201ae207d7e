//! An EC2 instance joins via a pre-signed `sts:GetCallerIdentity` URL.
//! The token restricts the allowed ARN to a glob; a caller ARN outside
//! that glob is rejected even though the signature itself would verify.

use meridian_core::ids::TokenName;
use meridian_core::model::{JoinMethod, JoinRole, JoinToken};
use meridian_join::{IamVerifier, JoinVerifier};
use std::collections::BTreeMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sts_body(arn: &str) -> String {
    format!(
        "<GetCallerIdentityResponse><GetCallerIdentityResult><Arn>{arn}</Arn></GetCallerIdentityResult></GetCallerIdentityResponse>"
    )
}

fn token(arn_glob: &str) -> JoinToken {
    let mut match_rules = BTreeMap::new();
    match_rules.insert("arn".to_string(), arn_glob.to_string());
    JoinToken {
        name: TokenName::new("t1"),
        allowed_roles: vec![JoinRole::Node],
        method: JoinMethod::Iam,
        match_rules,
        labels: BTreeMap::new(),
        expires_at: None,
    }
}

#[tokio::test]
async fn matching_arn_joins_mismatched_arn_is_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sts_body("arn:aws:iam::123:role/teleport-nodes")))
        .mount(&server)
        .await;

    let verifier = IamVerifier { client: reqwest::Client::new() };
    let allowed = token("arn:aws:iam::123:role/teleport-*");
    let identity = verifier.verify(&allowed, server.uri().as_bytes()).await.unwrap();
    assert_eq!(identity.principal, "arn:aws:iam::123:role/teleport-nodes");
    assert_eq!(identity.method, JoinMethod::Iam);

    let restrictive = token("arn:aws:iam::999:role/other-*");
    let err = verifier.verify(&restrictive, server.uri().as_bytes()).await.unwrap_err();
    assert_eq!(err.kind, meridian_core::ErrorKind::PermissionDenied);
}
