//! `TunnelService` implementation: a `DashMap`-backed pending-response
//! table keyed by channel id, resolved from a second stream of inbound
//! frames on the same bidi connection.

use crate::state::ProxyState;
use dashmap::DashMap;
use meridian_core::ids::ResourceId;
use meridian_core::{ErrorKind, MeridianError};
use meridian_proto::tunnel::agent_frame::Payload as AgentPayload;
use meridian_proto::tunnel::proxy_frame::Payload as ProxyPayload;
use meridian_proto::tunnel::tunnel_service_server::TunnelService;
use meridian_proto::tunnel::{
    ChannelOpen, DispatchChannelRequest, DispatchChannelResponse, ProxyFrame,
};
use meridian_tunnel::ChannelRequest;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};

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

pub struct TunnelServiceImpl {
    pub state: Arc<ProxyState>,
}

type PendingOpens = Arc<DashMap<String, oneshot::Sender<Result<(), MeridianError>>>>;

#[tonic::async_trait]
impl TunnelService for TunnelServiceImpl {
    type AgentSessionStream = ReceiverStream<Result<ProxyFrame, Status>>;

    async fn agent_session(
        &self,
        request: Request<tonic::Streaming<meridian_proto::tunnel::AgentFrame>>,
    ) -> Result<Response<Self::AgentSessionStream>, Status> {
        let mut incoming = request.into_inner();

        let hello = match incoming
            .next()
            .await
            .ok_or_else(|| Status::invalid_argument("agent session closed before sending AgentHello"))??
            .payload
        {
            Some(AgentPayload::Hello(hello)) => hello,
            _ => return Err(Status::invalid_argument("first frame on an agent session must be AgentHello")),
        };

        let resource = ResourceId::new(hello.resource_id.clone());
        let (channel_tx, mut channel_rx) = mpsc::channel::<ChannelRequest>(self.state.max_channels_per_agent);
        let (outbound_tx, outbound_rx) = mpsc::channel::<Result<ProxyFrame, Status>>(self.state.max_channels_per_agent);

        self.state.hub.register(
            resource.clone(),
            hello.capabilities.clone(),
            channel_tx,
            self.state.max_channels_per_agent,
            chrono::Utc::now(),
        );
        tracing::info!(resource = %resource, capabilities = ?hello.capabilities, "agent session established");

        let pending: PendingOpens = Arc::new(DashMap::new());

        let forward_tx = outbound_tx.clone();
        let forward_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(req) = channel_rx.recv().await {
                forward_pending.insert(req.channel_id.clone(), req.opened);
                let frame = ProxyFrame {
                    payload: Some(ProxyPayload::Open(ChannelOpen {
                        channel_id: req.channel_id,
                        capability: req.capability,
                    })),
                };
                if forward_tx.send(Ok(frame)).await.is_err() {
                    break;
                }
            }
        });

        let hub = Arc::clone(&self.state.hub);
        let session_resource = resource.clone();
        tokio::spawn(async move {
            loop {
                let frame = match incoming.next().await {
                    Some(Ok(frame)) => frame,
                    _ => break,
                };
                match frame.payload {
                    Some(AgentPayload::Accepted(accepted)) => {
                        if let Some((_, tx)) = pending.remove(&accepted.channel_id) {
                            let _ = tx.send(Ok(()));
                        }
                    }
                    Some(AgentPayload::Closed(closed)) => {
                        if let Some((_, tx)) = pending.remove(&closed.channel_id) {
                            let _ = tx.send(Err(MeridianError::unavailable(closed.reason)));
                        }
                    }
                    // Channel byte payloads are relayed by the session layer that
                    // terminates the client side of a channel; the hub only
                    // arbitrates open/close lifecycle, not data bytes.
                    Some(AgentPayload::Data(_)) | Some(AgentPayload::Hello(_)) | None => {}
                }
            }
            hub.unregister(&session_resource);
            tracing::info!(resource = %session_resource, "agent session closed");
        });

        Ok(Response::new(ReceiverStream::new(outbound_rx)))
    }

    async fn dispatch_channel(
        &self,
        request: Request<DispatchChannelRequest>,
    ) -> Result<Response<DispatchChannelResponse>, Status> {
        let req = request.into_inner();
        let channel_id = uuid::Uuid::new_v4().to_string();
        self.state
            .hub
            .dispatch(&req.capability, channel_id.clone())
            .await
            .map_err(to_status)?;
        Ok(Response::new(DispatchChannelResponse { channel_id }))
    }
}
