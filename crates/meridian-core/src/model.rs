//! Core domain entities, given Rust bindings. Traits use `BTreeMap` so
//! template expansion and audit serialization stay deterministic, which
//! matters for byte-exact round-tripping through the store and the
//! audit log.

use crate::ids::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Traits = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaType {
    Host,
    User,
    Db,
    DbClient,
    Openssh,
    Jwt,
    SamlIdp,
    Spiffe,
    OidcIdp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub traits: Traits,
    pub roles: Vec<RoleName>,
    pub access_lists: Vec<AccessListId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    pub max_session_ttl: chrono::Duration,
    pub roles: Vec<RoleName>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleVersion {
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockMode {
    BestEffort,
    Strict,
}

impl LockMode {
    /// `strict` always wins over `best-effort` when combining roles.
    pub fn combine(self, other: LockMode) -> LockMode {
        match (self, other) {
            (LockMode::Strict, _) | (_, LockMode::Strict) => LockMode::Strict,
            _ => LockMode::BestEffort,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleOptions {
    pub max_session_ttl: chrono::Duration,
    pub require_mfa: bool,
    pub port_forwarding: bool,
    pub record_session: bool,
    pub lock_mode: LockMode,
    pub pin_source_ip: bool,
}

impl RoleOptions {
    /// Combine two roles' options by taking the most restrictive value
    /// per-option.
    pub fn combine(&self, other: &RoleOptions) -> RoleOptions {
        RoleOptions {
            max_session_ttl: self.max_session_ttl.min(other.max_session_ttl),
            require_mfa: self.require_mfa || other.require_mfa,
            port_forwarding: self.port_forwarding && other.port_forwarding,
            record_session: self.record_session || other.record_session,
            lock_mode: self.lock_mode.combine(other.lock_mode),
            pin_source_ip: self.pin_source_ip || other.pin_source_ip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonMode {
    Optional,
    Required,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: RoleName,
    pub version: RoleVersion,
    pub allow: Vec<RuleSet>,
    pub deny: Vec<RuleSet>,
    pub options: RoleOptions,
    pub request_reason_mode: ReasonMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub resource_kinds: Vec<String>,
    pub label_matchers: Vec<LabelMatcher>,
    pub logins: Vec<String>,
    pub kube_users: Vec<String>,
    pub kube_groups: Vec<String>,
    pub db_users: Vec<String>,
    pub db_names: Vec<String>,
    /// Predicate expression source, parsed lazily by `meridian-rbac`.
    pub predicate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LabelMatcher {
    Exact { key: String, value: String },
    Glob { key: String, pattern: String },
    Regex { key: String, pattern: String },
    Template { key: String, template: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessListGrants {
    pub roles: Vec<RoleName>,
    pub traits: Traits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessList {
    pub id: AccessListId,
    pub owners: Vec<UserId>,
    pub members: Vec<AccessListMember>,
    pub grants: AccessListGrants,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccessListMember {
    User(UserId),
    List(AccessListId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Pending,
    Approved,
    Denied,
    Promoted,
    Expired,
    Assumed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: RequestId,
    pub requesting_user: UserId,
    pub requested_roles: Vec<RoleName>,
    pub requested_resources: Vec<ResourceId>,
    pub reason: Option<String>,
    pub max_duration: chrono::Duration,
    pub suggested_reviewers: Vec<UserId>,
    pub state: RequestState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinMethod {
    StaticSecret,
    Iam,
    Oidc,
    Kubernetes,
    Github,
    Gitlab,
    Azure,
    Gcp,
    Oracle,
    BoundKeypair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinRole {
    Node,
    Kube,
    App,
    Db,
    Proxy,
    Bot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinToken {
    pub name: TokenName,
    pub allowed_roles: Vec<JoinRole>,
    pub method: JoinMethod,
    pub match_rules: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl JoinToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Node,
    KubeServer,
    DbServer,
    AppServer,
    WindowsDesktop,
    Proxy,
    Auth,
    BotInstance,
    GitServer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    Healthy,
    Degraded,
    Unreachable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub kind: ResourceKind,
    pub name: ResourceId,
    pub hostname: String,
    pub labels: BTreeMap<String, String>,
    pub addresses: Vec<String>,
    pub health: Health,
    pub version: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Enforcement {
    BestEffort,
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LockTarget {
    User(UserId),
    Role(RoleName),
    Login(String),
    MfaDevice(DeviceId),
    DeviceId(String),
    ResourceName { kind: ResourceKind, name: ResourceId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub id: LockId,
    pub target: LockTarget,
    pub message: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub enforcement: Enforcement,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingMode {
    Off,
    Node,
    Proxy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTracker {
    pub id: SessionId,
    pub kind: String,
    pub participants: Vec<UserId>,
    pub moderator_policy: Option<String>,
    pub recording_mode: RecordingMode,
    pub started: DateTime<Utc>,
    pub host: ResourceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MfaDeviceKind {
    Webauthn,
    Totp,
    SsoProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaDevice {
    pub id: DeviceId,
    pub user: UserId,
    pub kind: MfaDeviceKind,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInstanceRecord {
    pub id: BotInstanceId,
    pub bot: BotId,
    pub join_method: JoinMethod,
    pub joined_at: DateTime<Utc>,
    pub last_renewal: DateTime<Utc>,
}
