//! `bob` files a request for `db-admin`; an auto-review rule matching
//! his allowlist trait and a JIRA-shaped reason approves it with review
//! author `system-autoapprove`. He assumes it and the extra role shows
//! up in the policy used for his next certificate.

use chrono::{Duration, Utc};
use meridian_ca::{CertAuthority, KeystoreBackend};
use meridian_core::ids::{RequestId, ResourceId, RoleName, UserId};
use meridian_core::model::{AccessRequest, CaType, LockMode, ReasonMode, RequestState, RoleOptions, RoleSpec, RoleVersion, Traits};
use meridian_issuer::{issue_user_certs, IssuanceRequest};
use meridian_rbac::EffectivePolicy;
use meridian_requests::rules::AutoReviewRule;
use meridian_requests::{RequestEngine, ReviewDecision};
use meridian_store::memory::MemoryBackend;
use meridian_store::Backend;
use std::sync::Arc;

fn db_admin_role() -> RoleSpec {
    RoleSpec {
        name: RoleName::new("db-admin"),
        version: RoleVersion::V8,
        allow: vec![],
        deny: vec![],
        options: RoleOptions {
            max_session_ttl: Duration::hours(4),
            require_mfa: false,
            port_forwarding: true,
            record_session: true,
            lock_mode: LockMode::BestEffort,
            pin_source_ip: false,
        },
        request_reason_mode: ReasonMode::Required,
    }
}

#[tokio::test]
async fn auto_approved_request_is_assumed_and_widens_the_next_cert() {
    let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let engine = RequestEngine::new(store.clone());
    let now = Utc::now();

    let request = AccessRequest {
        id: RequestId::new(uuid::Uuid::new_v4().to_string()),
        requesting_user: UserId::new("bob"),
        requested_roles: vec![RoleName::new("db-admin")],
        requested_resources: Vec::<ResourceId>::new(),
        reason: Some("JIRA-4821".into()),
        max_duration: Duration::hours(4),
        suggested_reviewers: vec![],
        state: RequestState::Pending,
        created_at: now,
        expires_at: now + Duration::hours(1),
    };
    engine.create(request.clone()).await.unwrap();

    let rule = AutoReviewRule {
        description: "allowlisted users with a JIRA reason auto-approve".into(),
        predicate: r#"contains(user.traits["allowlist"], "bob")"#.into(),
        reason_pattern: Some(r"JIRA-\d+".into()),
        decision: ReviewDecision::Approve,
    };
    let mut traits: Traits = Traits::new();
    traits.insert("allowlist".into(), vec!["bob".into()]);

    let applied = engine.apply_auto_reviews(&request.id, &[rule], &traits).await.unwrap();
    assert!(applied);

    let approved = engine.load(&request.id).await.unwrap();
    assert_eq!(approved.state, RequestState::Approved);

    let assumed = engine.assume(&request.id, &UserId::new("bob"), now).await.unwrap();
    assert_eq!(assumed.state, RequestState::Assumed);

    let base_role = RoleSpec {
        name: RoleName::new("user:bob"),
        version: RoleVersion::V8,
        allow: vec![],
        deny: vec![],
        options: RoleOptions {
            max_session_ttl: Duration::hours(8),
            require_mfa: false,
            port_forwarding: false,
            record_session: false,
            lock_mode: LockMode::BestEffort,
            pin_source_ip: false,
        },
        request_reason_mode: ReasonMode::Optional,
    };
    let policy = EffectivePolicy::from_roles(&[base_role, db_admin_role()]);
    assert_eq!(policy.options.max_session_ttl, Duration::hours(4));

    let ca = CertAuthority::bootstrap(CaType::User, KeystoreBackend::Software, now);
    let issuance = IssuanceRequest {
        user: &UserId::new("bob"),
        logins: vec!["bob".into()],
        route_info: "db01".into(),
        requested_ttl: Duration::hours(4),
        remaining_sso_ttl: Duration::hours(8),
        now,
    };
    let issued = issue_user_certs(&issuance, &policy, Duration::hours(12), b"subject-key-bob", &ca).unwrap();
    assert_eq!(issued.ssh.claims.expires_at - now, Duration::hours(4));
}
