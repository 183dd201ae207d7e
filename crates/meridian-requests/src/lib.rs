//! Access-request lifecycle: `PENDING -> {APPROVED, DENIED, PROMOTED,
//! EXPIRED}`, and `APPROVED -> ASSUMED` by the requesting user only,
//! before expiry. Automatic review rules reuse `meridian_rbac::Expr`
//! rather than re-implementing predicate matching. Reviewer races are
//! resolved by the store's CAS: the first `create_or_update` at the
//! expected revision wins, later callers see their `CompareFailed`
//! translated to "request already decided".

pub mod rules;

use chrono::{DateTime, Utc};
use meridian_core::ids::{RequestId, RoleName, UserId};
use meridian_core::model::{AccessRequest, ReasonMode, RequestState, RoleSpec};
use meridian_core::{ErrorKind, MeridianError};
use meridian_store::Backend;
use std::sync::Arc;

pub use rules::AutoReviewRule;

pub struct RequestEngine {
    store: Arc<dyn Backend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Deny,
}

pub struct Review {
    pub author: String,
    pub decision: ReviewDecision,
    pub reason: String,
}

impl RequestEngine {
    pub fn new(store: Arc<dyn Backend>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: AccessRequest) -> Result<(), MeridianError> {
        self.enforce_reason(&request).await?;

        let key = request_key(&request.id);
        let value = serde_json::to_vec(&request).expect("AccessRequest always serializes");
        self.store
            .create_or_update(&key, value, Some(meridian_core::ids::Revision::NONE))
            .await?;
        Ok(())
    }

    /// Rejects a reason-less request if any requested role declares
    /// `request_reason_mode = Required`. A role this engine cannot find
    /// in the store has nothing to enforce, so it is silently skipped
    /// rather than blocking the request.
    async fn enforce_reason(&self, request: &AccessRequest) -> Result<(), MeridianError> {
        if request.reason.as_deref().map(str::trim).unwrap_or("").is_empty() {
            for role_name in &request.requested_roles {
                if let Some(role) = self.load_role(role_name).await? {
                    if matches!(role.request_reason_mode, ReasonMode::Required) {
                        return Err(MeridianError::invalid_argument(format!(
                            "role '{role_name}' requires a non-empty reason for access requests"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    async fn load_role(&self, name: &RoleName) -> Result<Option<RoleSpec>, MeridianError> {
        let key = format!("role/{name}");
        match self.store.get(&key).await? {
            Some(item) => Ok(Some(serde_json::from_slice(&item.value).map_err(|e| {
                MeridianError::with_source(ErrorKind::InvalidArgument, "stored role is not valid JSON", e)
            })?)),
            None => Ok(None),
        }
    }

    /// Checks a freshly filed request against every configured automatic
    /// review rule and applies the first one that matches, with review
    /// author `system-autoapprove`/`system-autodeny`.
    pub async fn apply_auto_reviews(
        &self,
        request_id: &RequestId,
        rules: &[AutoReviewRule],
        traits: &meridian_core::model::Traits,
    ) -> Result<bool, MeridianError> {
        let mut request = self.load(request_id).await?;
        if !matches!(request.state, RequestState::Pending) {
            return Ok(false);
        }

        for rule in rules {
            if rule.matches(traits, request.reason.as_deref()) {
                let (decision, author) = match rule.decision {
                    ReviewDecision::Approve => (ReviewDecision::Approve, "system-autoapprove"),
                    ReviewDecision::Deny => (ReviewDecision::Deny, "system-autodeny"),
                };
                let review = Review {
                    author: author.to_string(),
                    decision,
                    reason: rule.description.clone(),
                };
                self.submit_review(&mut request, review).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn submit_review(&self, request: &mut AccessRequest, review: Review) -> Result<(), MeridianError> {
        if !matches!(request.state, RequestState::Pending) {
            return Err(MeridianError::failed_precondition("access request is no longer pending"));
        }

        let key = request_key(&request.id);
        let current = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| MeridianError::not_found(format!("access request {} not found", request.id)))?;

        request.state = match review.decision {
            ReviewDecision::Approve => RequestState::Approved,
            ReviewDecision::Deny => RequestState::Denied,
        };

        let value = serde_json::to_vec(request).expect("AccessRequest always serializes");
        match self.store.create_or_update(&key, value, Some(current.revision)).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind == ErrorKind::CompareFailed => {
                Err(MeridianError::failed_precondition("access request was already decided by another reviewer"))
            }
            Err(err) => Err(err),
        }
    }

    /// `APPROVED -> ASSUMED`, only by `requesting_user`, only before
    /// `expires_at`.
    pub async fn assume(&self, request_id: &RequestId, caller: &UserId, now: DateTime<Utc>) -> Result<AccessRequest, MeridianError> {
        let mut request = self.load(request_id).await?;

        if !matches!(request.state, RequestState::Approved) {
            return Err(MeridianError::failed_precondition("access request is not approved"));
        }
        if &request.requesting_user != caller {
            return Err(MeridianError::permission_denied("only the requesting user may assume this request"));
        }
        if request.expires_at <= now {
            return Err(MeridianError::new(ErrorKind::DeadlineExceeded, "access request has expired"));
        }

        let key = request_key(request_id);
        let current = self.store.get(&key).await?.ok_or_else(|| MeridianError::not_found("access request vanished"))?;
        request.state = RequestState::Assumed;
        let value = serde_json::to_vec(&request).expect("AccessRequest always serializes");
        self.store.create_or_update(&key, value, Some(current.revision)).await?;
        Ok(request)
    }

    pub async fn load(&self, id: &RequestId) -> Result<AccessRequest, MeridianError> {
        let item = self
            .store
            .get(&request_key(id))
            .await?
            .ok_or_else(|| MeridianError::not_found(format!("access request {id} not found")))?;
        serde_json::from_slice(&item.value)
            .map_err(|e| MeridianError::with_source(ErrorKind::FailedPrecondition, "corrupt access request record", e))
    }
}

fn request_key(id: &RequestId) -> String {
    format!("requests/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::ids::{ResourceId, RoleName};
    use meridian_store::memory::MemoryBackend;

    fn sample_request(user: &str, state: RequestState, now: DateTime<Utc>) -> AccessRequest {
        AccessRequest {
            id: RequestId::new(uuid::Uuid::new_v4().to_string()),
            requesting_user: UserId::new(user),
            requested_roles: vec![RoleName::new("db-admin")],
            requested_resources: Vec::<ResourceId>::new(),
            reason: Some("JIRA-123".into()),
            max_duration: chrono::Duration::hours(8),
            suggested_reviewers: vec![],
            state,
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn only_requester_may_assume_before_expiry() {
        let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let engine = RequestEngine::new(store);
        let now = Utc::now();
        let request = sample_request("bob", RequestState::Approved, now);
        engine.create(request.clone()).await.unwrap();

        let err = engine.assume(&request.id, &UserId::new("mallory"), now).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);

        let assumed = engine.assume(&request.id, &UserId::new("bob"), now).await.unwrap();
        assert_eq!(assumed.state, RequestState::Assumed);
    }

    #[tokio::test]
    async fn second_reviewer_loses_the_race() {
        let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let engine = RequestEngine::new(store);
        let now = Utc::now();
        let request = sample_request("bob", RequestState::Pending, now);
        engine.create(request.clone()).await.unwrap();

        let mut first = engine.load(&request.id).await.unwrap();
        let mut second = engine.load(&request.id).await.unwrap();

        engine
            .submit_review(&mut first, Review { author: "alice".into(), decision: ReviewDecision::Approve, reason: "ok".into() })
            .await
            .unwrap();

        let err = engine
            .submit_review(&mut second, Review { author: "carol".into(), decision: ReviewDecision::Deny, reason: "no".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn auto_approve_rule_fires_for_matching_reason() {
        let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let engine = RequestEngine::new(store);
        let now = Utc::now();
        let request = sample_request("bob", RequestState::Pending, now);
        engine.create(request.clone()).await.unwrap();

        let rule = AutoReviewRule {
            description: "allowlisted users with a JIRA reason auto-approve".into(),
            predicate: r#"contains(user.traits["allowlist"], "bob")"#.into(),
            reason_pattern: Some("JIRA-\\d+".into()),
            decision: ReviewDecision::Approve,
        };
        let mut traits = meridian_core::model::Traits::new();
        traits.insert("allowlist".into(), vec!["bob".into()]);

        let applied = engine.apply_auto_reviews(&request.id, &[rule], &traits).await.unwrap();
        assert!(applied);

        let reloaded = engine.load(&request.id).await.unwrap();
        assert_eq!(reloaded.state, RequestState::Approved);
    }

    fn role_requiring_reason(name: &str) -> RoleSpec {
        RoleSpec {
            name: RoleName::new(name),
            version: meridian_core::model::RoleVersion::V8,
            allow: vec![],
            deny: vec![],
            options: meridian_core::model::RoleOptions {
                max_session_ttl: chrono::Duration::hours(8),
                require_mfa: false,
                port_forwarding: true,
                record_session: false,
                lock_mode: meridian_core::model::LockMode::BestEffort,
                pin_source_ip: false,
            },
            request_reason_mode: ReasonMode::Required,
        }
    }

    #[tokio::test]
    async fn reason_less_request_for_a_reason_required_role_is_rejected() {
        let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let role = role_requiring_reason("db-admin");
        store
            .create_or_update("role/db-admin", serde_json::to_vec(&role).unwrap(), None)
            .await
            .unwrap();

        let engine = RequestEngine::new(store);
        let now = Utc::now();
        let mut request = sample_request("bob", RequestState::Pending, now);
        request.reason = None;

        let err = engine.create(request.clone()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);

        request.reason = Some("JIRA-999".into());
        engine.create(request).await.unwrap();
    }
}
