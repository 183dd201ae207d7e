//! Lock matching. A lock blocks a principal by presence, not by a
//! deny rule: it names a target (user, role, login, MFA device, device
//! id, or a specific resource) and, while unexpired, makes every
//! authorization question about that target answer `PermissionDenied`.
//! Whether an in-progress session gets torn down as a result is a
//! question for whatever owns the session's heartbeat loop; `LockSet`
//! only answers "is this principal currently blocked".

use chrono::{DateTime, Utc};
use meridian_core::ids::{DeviceId, RoleName, UserId};
use meridian_core::model::{Enforcement, Lock, LockTarget};

pub struct LockSet<'a> {
    locks: Vec<&'a Lock>,
}

/// The principal-shaped facts a lock target can match against. Callers
/// assemble this from whatever they already resolved (the cert's claims,
/// the role list) rather than `LockSet` re-deriving it.
pub struct PrincipalFacts<'a> {
    pub user: &'a UserId,
    pub roles: &'a [RoleName],
    pub logins: &'a [String],
    pub mfa_device: Option<&'a DeviceId>,
}

impl<'a> LockSet<'a> {
    pub fn new(locks: impl IntoIterator<Item = &'a Lock>) -> Self {
        Self { locks: locks.into_iter().collect() }
    }

    fn is_live(lock: &Lock, now: DateTime<Utc>) -> bool {
        !matches!(lock.expires_at, Some(expires_at) if expires_at <= now)
    }

    fn target_matches(target: &LockTarget, facts: &PrincipalFacts) -> bool {
        match target {
            LockTarget::User(user) => user == facts.user,
            LockTarget::Role(role) => facts.roles.contains(role),
            LockTarget::Login(login) => facts.logins.iter().any(|l| l == login),
            LockTarget::MfaDevice(device) => facts.mfa_device == Some(device),
            LockTarget::DeviceId(_) | LockTarget::ResourceName { .. } => false,
        }
    }

    /// The first live lock matching `facts`, if any. Returning the lock
    /// itself (rather than a bool) lets the caller build a useful
    /// `PermissionDenied` message from `lock.message`.
    pub fn blocking(&self, facts: &PrincipalFacts, now: DateTime<Utc>) -> Option<&'a Lock> {
        self.locks
            .iter()
            .copied()
            .find(|lock| Self::is_live(lock, now) && Self::target_matches(&lock.target, facts))
    }

    /// The deadline by which a `strict` lock's matching sessions must
    /// have ended, per the two-heartbeat-interval bound: the session
    /// either ends before this deadline or its next heartbeat fails.
    pub fn strict_kill_deadline(lock: &Lock, heartbeat_interval: chrono::Duration) -> Option<DateTime<Utc>> {
        matches!(lock.enforcement, Enforcement::Strict).then(|| lock.created_at + heartbeat_interval * 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::ids::LockId;

    fn lock(target: LockTarget, enforcement: Enforcement, now: DateTime<Utc>) -> Lock {
        Lock {
            id: LockId::new("lock1"),
            target,
            message: "blocked".into(),
            expires_at: None,
            enforcement,
            created_at: now,
        }
    }

    #[test]
    fn user_lock_blocks_matching_principal() {
        let now = Utc::now();
        let l = lock(LockTarget::User(UserId::new("mallory")), Enforcement::Strict, now);
        let locks = LockSet::new([&l]);

        let facts = PrincipalFacts {
            user: &UserId::new("mallory"),
            roles: &[],
            logins: &[],
            mfa_device: None,
        };
        assert!(locks.blocking(&facts, now).is_some());

        let other = PrincipalFacts {
            user: &UserId::new("alice"),
            roles: &[],
            logins: &[],
            mfa_device: None,
        };
        assert!(locks.blocking(&other, now).is_none());
    }

    #[test]
    fn expired_lock_does_not_block() {
        let now = Utc::now();
        let mut l = lock(LockTarget::User(UserId::new("mallory")), Enforcement::BestEffort, now);
        l.expires_at = Some(now - chrono::Duration::seconds(1));
        let locks = LockSet::new([&l]);

        let facts = PrincipalFacts {
            user: &UserId::new("mallory"),
            roles: &[],
            logins: &[],
            mfa_device: None,
        };
        assert!(locks.blocking(&facts, now).is_none());
    }

    #[test]
    fn strict_kill_deadline_is_two_heartbeats_out() {
        let now = Utc::now();
        let l = lock(LockTarget::User(UserId::new("mallory")), Enforcement::Strict, now);
        let deadline = LockSet::strict_kill_deadline(&l, chrono::Duration::seconds(30)).unwrap();
        assert_eq!(deadline, now + chrono::Duration::seconds(60));

        let best_effort = lock(LockTarget::User(UserId::new("mallory")), Enforcement::BestEffort, now);
        assert!(LockSet::strict_kill_deadline(&best_effort, chrono::Duration::seconds(30)).is_none());
    }
}
