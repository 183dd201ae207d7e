//! Once a strict lock names `mallory`, any subsequent certificate
//! request for her is refused before issuance ever runs; an unlocked
//! user, or a lock that has already expired, is unaffected.

use chrono::Utc;
use meridian_ca::{CertAuthority, KeystoreBackend};
use meridian_core::ids::{LockId, UserId};
use meridian_core::model::{CaType, Enforcement, Lock, LockTarget, RoleOptions, RoleSpec, RoleVersion};
use meridian_issuer::{issue_user_certs, IssuanceRequest};
use meridian_rbac::{EffectivePolicy, LockSet, PrincipalFacts};

fn minimal_role() -> RoleSpec {
    RoleSpec {
        name: meridian_core::ids::RoleName::new("base"),
        version: RoleVersion::V8,
        allow: vec![],
        deny: vec![],
        options: RoleOptions {
            max_session_ttl: chrono::Duration::hours(8),
            require_mfa: false,
            port_forwarding: true,
            record_session: false,
            lock_mode: meridian_core::model::LockMode::BestEffort,
            pin_source_ip: false,
        },
        request_reason_mode: meridian_core::model::ReasonMode::Optional,
    }
}

fn check_lock_then_issue(
    user: &UserId,
    locks: &[Lock],
    policy: &EffectivePolicy,
    ca: &CertAuthority,
    now: chrono::DateTime<Utc>,
) -> Result<(), meridian_core::MeridianError> {
    let facts = PrincipalFacts { user, roles: &[], logins: &[user.as_str().to_string()], mfa_device: None };
    if let Some(lock) = LockSet::new(locks).blocking(&facts, now) {
        return Err(meridian_core::MeridianError::permission_denied(format!("locked: {}", lock.message)));
    }

    let req = IssuanceRequest {
        user,
        logins: vec![user.as_str().to_string()],
        route_info: "cluster1".into(),
        requested_ttl: chrono::Duration::hours(1),
        remaining_sso_ttl: chrono::Duration::hours(8),
        now,
    };
    issue_user_certs(&req, policy, chrono::Duration::hours(8), b"subject-key", ca).map(|_| ())
}

#[test]
fn strict_lock_on_mallory_blocks_issuance_alice_is_unaffected() {
    let now = Utc::now();
    let policy = EffectivePolicy::from_roles(&[minimal_role()]);
    let ca = CertAuthority::bootstrap(CaType::User, KeystoreBackend::Software, now);

    let locks = vec![Lock {
        id: LockId::new("lock-mallory"),
        target: LockTarget::User(UserId::new("mallory")),
        message: "compromised credentials".into(),
        expires_at: None,
        enforcement: Enforcement::Strict,
        created_at: now,
    }];

    let err = check_lock_then_issue(&UserId::new("mallory"), &locks, &policy, &ca, now).unwrap_err();
    assert_eq!(err.kind, meridian_core::ErrorKind::PermissionDenied);

    check_lock_then_issue(&UserId::new("alice"), &locks, &policy, &ca, now).unwrap();
}

#[test]
fn expired_lock_no_longer_blocks_issuance() {
    let now = Utc::now();
    let policy = EffectivePolicy::from_roles(&[minimal_role()]);
    let ca = CertAuthority::bootstrap(CaType::User, KeystoreBackend::Software, now);

    let locks = vec![Lock {
        id: LockId::new("lock-mallory"),
        target: LockTarget::User(UserId::new("mallory")),
        message: "compromised credentials".into(),
        expires_at: Some(now - chrono::Duration::seconds(1)),
        enforcement: Enforcement::Strict,
        created_at: now - chrono::Duration::hours(1),
    }];

    check_lock_then_issue(&UserId::new("mallory"), &locks, &policy, &ca, now).unwrap();
}
