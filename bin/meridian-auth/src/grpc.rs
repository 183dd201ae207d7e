//! `AuthService` implementation: translates `tonic::Status` at the RPC
//! boundary, delegating everything else to the component crates.

use crate::state::AuthState;
use chrono::{Duration, Utc};
use meridian_core::model::CaType;
use meridian_core::{ErrorKind, MeridianError};
use meridian_federation::export_bundle;
use meridian_issuer::{issue_user_certs, IssuanceRequest};
use meridian_join::JoinVerifier;
use meridian_proto::auth::auth_service_server::AuthService;
use meridian_proto::auth::{
    ExportCaBundleRequest, ExportCaBundleResponse, HeartbeatRequest, HeartbeatResponse, IssueUserCertsRequest,
    IssueUserCertsResponse, RegisterAgentRequest, RegisterAgentResponse,
};
use meridian_rbac::{EffectivePolicy, LockSet, PrincipalFacts};
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct AuthServiceImpl {
    pub state: Arc<AuthState>,
}

fn to_status(err: MeridianError) -> Status {
    let code = match err.kind {
        ErrorKind::InvalidArgument => tonic::Code::InvalidArgument,
        ErrorKind::NotFound => tonic::Code::NotFound,
        ErrorKind::AlreadyExists => tonic::Code::AlreadyExists,
        ErrorKind::CompareFailed => tonic::Code::Aborted,
        ErrorKind::PermissionDenied => tonic::Code::PermissionDenied,
        ErrorKind::Unauthenticated => tonic::Code::Unauthenticated,
        ErrorKind::ResourceExhausted => tonic::Code::ResourceExhausted,
        ErrorKind::Unavailable => tonic::Code::Unavailable,
        ErrorKind::FailedPrecondition => tonic::Code::FailedPrecondition,
        ErrorKind::Canceled => tonic::Code::Cancelled,
        ErrorKind::DeadlineExceeded => tonic::Code::DeadlineExceeded,
    };
    Status::new(code, err.message)
}

#[tonic::async_trait]
impl AuthService for AuthServiceImpl {
    async fn issue_user_certs(
        &self,
        request: Request<IssueUserCertsRequest>,
    ) -> Result<Response<IssueUserCertsResponse>, Status> {
        let req = request.into_inner();
        let user = meridian_core::ids::UserId::new(req.user);

        // Resolving the caller's roles from a real session is the gRPC
        // middleware's job; here we take the user's own name as a role
        // name stand-in only so the pipeline below has something to feed
        // `EffectivePolicy::from_roles`.
        let role_names = vec![meridian_core::ids::RoleName::new(format!("user:{user}"))];
        let roles = self.state.load_roles(&role_names).await.map_err(to_status)?;
        let policy = EffectivePolicy::from_roles(&roles);

        let now = Utc::now();
        let active_locks = self.state.load_active_locks().await.map_err(to_status)?;
        let facts = PrincipalFacts {
            user: &user,
            roles: &role_names,
            logins: &req.logins,
            mfa_device: None,
        };
        if let Some(lock) = LockSet::new(&active_locks).blocking(&facts, now) {
            return Err(Status::permission_denied(format!("locked: {}", lock.message)));
        }

        let issuance = IssuanceRequest {
            user: &user,
            logins: req.logins,
            route_info: req.route_info,
            requested_ttl: Duration::seconds(req.requested_ttl_seconds.max(0)),
            remaining_sso_ttl: Duration::hours(self.state.ctx.config.user_cert_ttl_hours),
            now,
        };

        let ca_lock = self.state.ca(CaType::User).map_err(to_status)?;
        let ca = ca_lock.read().expect("CA lock poisoned");

        let issued = issue_user_certs(
            &issuance,
            &policy,
            Duration::hours(self.state.ctx.config.user_cert_ttl_hours),
            &req.subject_public_key,
            &ca,
        )
        .map_err(to_status)?;

        Ok(Response::new(IssueUserCertsResponse {
            ssh_cert: issued.ssh.cert_bytes,
            tls_cert: issued.tls.der,
            mfa_required: issued.mfa_required,
            expires_at_unix: issued.tls.claims.expires_at.timestamp(),
        }))
    }

    async fn register_agent(
        &self,
        request: Request<RegisterAgentRequest>,
    ) -> Result<Response<RegisterAgentResponse>, Status> {
        let req = request.into_inner();

        let token_key = format!("join_token/{}", req.token_name);
        let item = self
            .state
            .store
            .get(&token_key)
            .await
            .map_err(to_status)?
            .ok_or_else(|| Status::not_found("no such join token"))?;
        let token: meridian_core::model::JoinToken = serde_json::from_slice(&item.value)
            .map_err(|e| Status::invalid_argument(format!("stored join token is corrupt: {e}")))?;

        let identity = match req.join_method.as_str() {
            "static_token" => self.state.static_token_verifier.verify(&token, &req.proof).await,
            "bound_keypair" => self.state.bound_keypair_verifier.verify(&token, &req.proof).await,
            other => Err(MeridianError::new(ErrorKind::InvalidArgument, format!("unsupported join method '{other}'"))),
        }
        .map_err(to_status)?;

        let ca_lock = self.state.ca(CaType::Host).map_err(to_status)?;
        let ca = ca_lock.read().expect("CA lock poisoned");
        let digest = <sha2::Sha256 as sha2::Digest>::digest(identity.principal.as_bytes());
        let signature = ca.active.signer.sign(&digest).map_err(to_status)?;

        Ok(Response::new(RegisterAgentResponse {
            host_cert: signature.0,
            assigned_role: format!("{:?}", identity.role),
        }))
    }

    async fn export_ca_bundle(
        &self,
        request: Request<ExportCaBundleRequest>,
    ) -> Result<Response<ExportCaBundleResponse>, Status> {
        let req = request.into_inner();
        let ca_type = parse_ca_type(&req.ca_type).map_err(to_status)?;
        let ca_lock = self.state.ca(ca_type).map_err(to_status)?;
        let ca = ca_lock.read().expect("CA lock poisoned");
        Ok(Response::new(ExportCaBundleResponse { pem_bundle: export_bundle(&ca) }))
    }

    async fn heartbeat(&self, request: Request<HeartbeatRequest>) -> Result<Response<HeartbeatResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!(resource = %req.resource_id, version = %req.version, "agent heartbeat");
        Ok(Response::new(HeartbeatResponse {
            next_heartbeat_after_seconds: self.state.ctx.config.heartbeat_interval_secs as i64,
        }))
    }
}

fn parse_ca_type(s: &str) -> Result<CaType, MeridianError> {
    match s {
        "Host" => Ok(CaType::Host),
        "User" => Ok(CaType::User),
        "Db" => Ok(CaType::Db),
        "DbClient" => Ok(CaType::DbClient),
        "Openssh" => Ok(CaType::Openssh),
        "Jwt" => Ok(CaType::Jwt),
        "SamlIdp" => Ok(CaType::SamlIdp),
        "Spiffe" => Ok(CaType::Spiffe),
        "OidcIdp" => Ok(CaType::OidcIdp),
        other => Err(MeridianError::invalid_argument(format!("unknown CA type '{other}'"))),
    }
}
