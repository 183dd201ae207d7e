//! Process-wide state for the Auth Service: one `CertAuthority` per CA
//! type, the store backend, and every component crate wired against it.
//! Built once in `main` and handed to both the gRPC and HTTP surfaces as
//! an `Arc`.

use chrono::Utc;
use meridian_audit::AuditBus;
use meridian_ca::{CertAuthority, KeystoreBackend};
use meridian_core::model::{CaType, RoleSpec};
use meridian_core::{ClusterContext, MeridianError};
use meridian_join::{BoundKeypairVerifier, StaticTokenVerifier};
use meridian_mfa::MfaGate;
use meridian_requests::RequestEngine;
use meridian_store::Backend;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct AuthState {
    pub ctx: ClusterContext,
    pub store: Arc<dyn Backend>,
    pub cas: HashMap<CaType, RwLock<CertAuthority>>,
    pub mfa: MfaGate,
    pub requests: RequestEngine,
    pub audit: Arc<AuditBus>,
    pub static_token_verifier: StaticTokenVerifier,
    pub bound_keypair_verifier: BoundKeypairVerifier,
}

impl AuthState {
    pub fn new(ctx: ClusterContext, store: Arc<dyn Backend>, audit: Arc<AuditBus>) -> Self {
        let now = Utc::now();
        let mut cas = HashMap::new();
        for ca_type in [
            CaType::Host,
            CaType::User,
            CaType::Db,
            CaType::DbClient,
            CaType::Openssh,
            CaType::Jwt,
            CaType::SamlIdp,
            CaType::Spiffe,
            CaType::OidcIdp,
        ] {
            cas.insert(ca_type, RwLock::new(CertAuthority::bootstrap(ca_type, KeystoreBackend::Software, now)));
        }

        Self {
            mfa: MfaGate::new(store.clone()),
            requests: RequestEngine::new(store.clone()),
            static_token_verifier: StaticTokenVerifier { clock: Arc::new(meridian_core::clock::SystemClock) },
            bound_keypair_verifier: BoundKeypairVerifier::new(Arc::new(meridian_core::clock::SystemClock)),
            store,
            ctx,
            cas,
            audit,
        }
    }

    pub fn ca(&self, ca_type: CaType) -> Result<&RwLock<CertAuthority>, MeridianError> {
        self.cas
            .get(&ca_type)
            .ok_or_else(|| MeridianError::not_found(format!("no CA of type {ca_type:?} on this cluster")))
    }

    /// Roles are kept in the store under `role/<name>`, one JSON document
    /// each, the same layout access requests and MFA challenges use for
    /// their own keyspaces.
    pub async fn load_role(&self, name: &str) -> Result<Option<RoleSpec>, MeridianError> {
        let key = format!("role/{name}");
        match self.store.get(&key).await? {
            Some(item) => Ok(Some(serde_json::from_slice(&item.value).map_err(|e| {
                MeridianError::with_source(meridian_core::ErrorKind::InvalidArgument, "stored role is not valid JSON", e)
            })?)),
            None => Ok(None),
        }
    }

    pub async fn load_roles(&self, names: &[meridian_core::ids::RoleName]) -> Result<Vec<RoleSpec>, MeridianError> {
        let mut roles = Vec::with_capacity(names.len());
        for name in names {
            if let Some(role) = self.load_role(name.as_str()).await? {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    /// Every lock currently on file, stored under `lock/<id>`. Expiry is
    /// left to the caller (`LockSet::blocking`) rather than filtered here,
    /// so a stale-but-present lock is still visible to callers that want it.
    pub async fn load_active_locks(&self) -> Result<Vec<meridian_core::model::Lock>, MeridianError> {
        let mut locks = Vec::new();
        let mut start_key = None;
        loop {
            let (items, next) = self.store.list("lock/", 256, start_key.as_deref()).await?;
            for item in &items {
                let lock: meridian_core::model::Lock = serde_json::from_slice(&item.value).map_err(|e| {
                    MeridianError::with_source(meridian_core::ErrorKind::InvalidArgument, "stored lock is not valid JSON", e)
                })?;
                locks.push(lock);
            }
            match next {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(locks)
    }
}
