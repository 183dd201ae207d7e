//! Turns a resolved policy into a matched pair of certificates bound to
//! the same subject key: an SSH certificate carrying allowed logins, and
//! an X.509 certificate carrying the same identity claims in its
//! extensions. See `issue_user_certs` for the five-step pipeline.

pub mod claims;
pub mod ssh;
pub mod tls;

use chrono::{DateTime, Duration, Utc};
use meridian_ca::CertAuthority;
use meridian_core::ids::UserId;
use meridian_core::{ErrorKind, MeridianError};
use meridian_rbac::EffectivePolicy;

pub use claims::IdentityClaims;
pub use ssh::SshCertificate;
pub use tls::TlsCertificate;

pub struct IssuedCerts {
    pub ssh: SshCertificate,
    pub tls: TlsCertificate,
    pub mfa_required: bool,
}

pub struct IssuanceRequest<'a> {
    pub user: &'a UserId,
    pub logins: Vec<String>,
    pub route_info: String,
    pub requested_ttl: Duration,
    pub remaining_sso_ttl: Duration,
    pub now: DateTime<Utc>,
}

/// Implements the five issuance steps: the caller has already resolved
/// (1) proof of identity and (2) the effective policy; here we (3) flag
/// `mfa_required` if any allowed resource demands per-session MFA, (4)
/// produce matched SSH/TLS certs over one subject key, and (5) clamp the
/// TTL to the tightest of requested/role/cluster/SSO bounds.
pub fn issue_user_certs(
    req: &IssuanceRequest,
    policy: &EffectivePolicy,
    cluster_max_ttl: Duration,
    subject_public_key: &[u8],
    ca: &CertAuthority,
) -> Result<IssuedCerts, MeridianError> {
    let logins = canonicalize_principals(&req.logins)?;

    let ttl = [
        req.requested_ttl,
        policy.options.max_session_ttl,
        cluster_max_ttl,
        req.remaining_sso_ttl,
    ]
    .into_iter()
    .min()
    .unwrap_or(Duration::zero());

    if ttl <= Duration::zero() {
        return Err(MeridianError::new(
            ErrorKind::FailedPrecondition,
            "resolved certificate TTL is zero or negative",
        ));
    }

    let mfa_required = requires_mfa(policy, req);

    let claims = IdentityClaims {
        user: req.user.clone(),
        logins: logins.clone(),
        route_info: req.route_info.clone(),
        mfa_required,
        issued_at: req.now,
        expires_at: req.now + ttl,
    };

    let ssh = ssh::issue(&claims, subject_public_key, ca.active.signer.as_ref())?;
    let tls = tls::issue(&claims, subject_public_key, ca.active.signer.as_ref())?;

    Ok(IssuedCerts { ssh, tls, mfa_required })
}

/// The role-level `require_mfa` option already reflects the strictest
/// value across every role that fed into this policy (combined in
/// `EffectivePolicy::from_roles`), so issuance only needs to read it
/// back; per-session challenge issuance itself lives in `meridian-mfa`.
fn requires_mfa(policy: &EffectivePolicy, _req: &IssuanceRequest) -> bool {
    policy.options.require_mfa
}

/// Rejects principals containing `/` outright (Entra ID can produce
/// these); hostnames over 256 chars or containing characters outside
/// `[A-Za-z0-9.-]` are replaced by a host UUID, with the original kept
/// as a label by the caller.
fn canonicalize_principals(logins: &[String]) -> Result<Vec<String>, MeridianError> {
    static HOSTNAME_RE: once_cell::sync::Lazy<regex::Regex> =
        once_cell::sync::Lazy::new(|| regex::Regex::new(r"^[A-Za-z0-9.-]+$").unwrap());

    let mut out = Vec::with_capacity(logins.len());
    for login in logins {
        if login.contains('/') {
            return Err(MeridianError::new(
                ErrorKind::InvalidArgument,
                format!("principal '{login}' contains '/' and is rejected"),
            ));
        }
        if login.len() > 256 || !HOSTNAME_RE.is_match(login) {
            out.push(uuid::Uuid::new_v4().to_string());
        } else {
            out.push(login.clone());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_with_slash_is_rejected() {
        let err = canonicalize_principals(&["alice/admin".to_string()]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn principal_of_256_chars_accepted_257_replaced() {
        let ok = "a".repeat(256);
        let too_long = "a".repeat(257);
        let out = canonicalize_principals(&[ok.clone(), too_long]).unwrap();
        assert_eq!(out[0], ok);
        assert_ne!(out[1], "a".repeat(257));
    }

    #[test]
    fn ttl_is_tightest_of_four_bounds() {
        let req = IssuanceRequest {
            user: &UserId::new("alice"),
            logins: vec!["alice".into()],
            route_info: "cluster1".into(),
            requested_ttl: Duration::hours(12),
            remaining_sso_ttl: Duration::hours(2),
            now: Utc::now(),
        };
        let role = meridian_core::model::RoleSpec {
            name: meridian_core::ids::RoleName::new("r1"),
            version: meridian_core::model::RoleVersion::V8,
            allow: vec![],
            deny: vec![],
            options: meridian_core::model::RoleOptions {
                max_session_ttl: Duration::days(1),
                require_mfa: false,
                port_forwarding: true,
                record_session: false,
                lock_mode: meridian_core::model::LockMode::BestEffort,
                pin_source_ip: false,
            },
            request_reason_mode: meridian_core::model::ReasonMode::Optional,
        };
        let policy = EffectivePolicy::from_roles(&[role]);
        let ca = CertAuthority::bootstrap(
            meridian_core::model::CaType::User,
            meridian_ca::KeystoreBackend::Software,
            req.now,
        );
        let issued = issue_user_certs(&req, &policy, Duration::hours(8), b"fake-subject-key", &ca).unwrap();
        assert_eq!(issued.ssh.claims.expires_at - req.now, Duration::hours(2));
    }
}
