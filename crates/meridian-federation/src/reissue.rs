//! Leaf re-issuance: a trusted root cluster forwards an already-resolved
//! remote identity, and the leaf mints its own short-lived certificate
//! pair under the leaf's own CA, scoped to the leaf's own mapped roles.
//! This calls straight back into `meridian-issuer` with the leaf's own
//! policy rather than trusting any certificate the root handed over.

use crate::role_mapping::RoleMapper;
use chrono::{DateTime, Duration, Utc};
use meridian_ca::CertAuthority;
use meridian_core::ids::UserId;
use meridian_core::model::RoleSpec;
use meridian_core::{ErrorKind, MeridianError};
use meridian_issuer::{issue_user_certs, IssuanceRequest, IssuedCerts};
use meridian_rbac::EffectivePolicy;

pub struct RemoteIdentity {
    pub user: UserId,
    pub remote_roles: Vec<String>,
    pub logins: Vec<String>,
    pub requested_ttl: Duration,
}

/// Maps `identity.remote_roles` through `mapper`, looks each mapped role
/// up in `local_roles`, folds the result into an `EffectivePolicy`, and
/// issues a fresh leaf-local certificate pair over `subject_public_key`.
/// Remote roles with no local mapping are silently excluded from the
/// resulting policy rather than rejected outright, matching
/// `RoleMapper::map_roles`'s fail-closed behavior.
pub fn reissue_for_leaf(
    identity: &RemoteIdentity,
    mapper: &RoleMapper,
    local_roles: &[RoleSpec],
    cluster_max_ttl: Duration,
    subject_public_key: &[u8],
    ca: &CertAuthority,
    now: DateTime<Utc>,
) -> Result<IssuedCerts, MeridianError> {
    let mapped = mapper.map_roles(&identity.remote_roles);
    if mapped.is_empty() {
        return Err(MeridianError::new(
            ErrorKind::PermissionDenied,
            "no local role mapping for the presented remote roles",
        ));
    }

    let resolved: Vec<RoleSpec> = local_roles
        .iter()
        .filter(|role| mapped.contains(&role.name))
        .cloned()
        .collect();
    if resolved.is_empty() {
        return Err(MeridianError::new(
            ErrorKind::PermissionDenied,
            "mapped local roles do not exist on this cluster",
        ));
    }

    let policy = EffectivePolicy::from_roles(&resolved);
    let req = IssuanceRequest {
        user: &identity.user,
        logins: identity.logins.clone(),
        route_info: "trusted-cluster".into(),
        requested_ttl: identity.requested_ttl,
        remaining_sso_ttl: identity.requested_ttl,
        now,
    };

    issue_user_certs(&req, &policy, cluster_max_ttl, subject_public_key, ca)
}
