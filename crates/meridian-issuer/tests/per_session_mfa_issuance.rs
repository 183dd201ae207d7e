//! A user whose role demands MFA gets a cert marked `mfa_required`;
//! completing a short-lived challenge and reissuing with its
//! `acr_values` carried forward models the second, per-session cert a
//! real login produces after the challenge is solved.

use chrono::{Duration, Utc};
use meridian_ca::{CertAuthority, KeystoreBackend};
use meridian_core::ids::{RoleName, UserId};
use meridian_core::model::{CaType, LockMode, MfaDeviceKind, ReasonMode, RoleOptions, RoleSpec, RoleVersion};
use meridian_issuer::{issue_user_certs, IssuanceRequest};
use meridian_mfa::MfaGate;
use meridian_rbac::EffectivePolicy;
use meridian_store::memory::MemoryBackend;
use meridian_store::Backend;
use std::sync::Arc;

fn mfa_required_role() -> RoleSpec {
    RoleSpec {
        name: RoleName::new("db-access"),
        version: RoleVersion::V8,
        allow: vec![],
        deny: vec![],
        options: RoleOptions {
            max_session_ttl: Duration::hours(8),
            require_mfa: true,
            port_forwarding: false,
            record_session: true,
            lock_mode: LockMode::BestEffort,
            pin_source_ip: false,
        },
        request_reason_mode: ReasonMode::Optional,
    }
}

#[tokio::test]
async fn login_cert_flags_mfa_required_then_challenge_unlocks_a_session_cert() {
    let now = Utc::now();
    let role = mfa_required_role();
    let policy = EffectivePolicy::from_roles(&[role]);
    let ca = CertAuthority::bootstrap(CaType::User, KeystoreBackend::Software, now);

    let login = IssuanceRequest {
        user: &UserId::new("alice"),
        logins: vec!["alice".into()],
        route_info: "cluster1".into(),
        requested_ttl: Duration::hours(8),
        remaining_sso_ttl: Duration::hours(8),
        now,
    };
    let login_certs = issue_user_certs(&login, &policy, Duration::hours(12), b"subject-key-1", &ca).unwrap();
    assert!(login_certs.mfa_required);

    let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let mfa = MfaGate::new(store);
    let challenge = mfa
        .issue_challenge(UserId::new("alice"), None, MfaDeviceKind::Webauthn, None, now)
        .await
        .unwrap();

    let consumed = mfa.consume_challenge(&challenge.id, now).await.unwrap();
    assert_eq!(consumed.user, UserId::new("alice"));

    let session = IssuanceRequest {
        user: &UserId::new("alice"),
        logins: vec!["alice".into()],
        route_info: "db01".into(),
        requested_ttl: Duration::seconds(60),
        remaining_sso_ttl: Duration::hours(8),
        now,
    };
    let session_certs = issue_user_certs(&session, &policy, Duration::hours(12), b"subject-key-1", &ca).unwrap();
    assert_eq!(session_certs.ssh.claims.expires_at - now, Duration::seconds(60));

    let err = mfa.consume_challenge(&challenge.id, now).await.unwrap_err();
    assert_eq!(err.kind, meridian_core::ErrorKind::AlreadyExists);
}
