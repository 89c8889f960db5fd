//! One browser connection relayed to one upstream connection.
//!
//! A session moves through `Connecting -> Relaying -> Closing -> Closed`.
//! Credentials are resolved before any upstream attempt. While relaying, two
//! pumps run as separate tasks; the first one to stop records the close
//! cause and cancels the shared token, which stops its sibling. Both legs
//! then get a best-effort close frame.

mod error;
mod pumps;
mod router;
mod stats;

pub use error::SessionError;
pub use pumps::{PumpExit, client_to_upstream, upstream_to_client};
pub use router::{ClientFrameRouter, RouteDecision};
pub use stats::{SessionStats, StatsSnapshot};

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::extract::ws::{CloseFrame as ClientCloseFrame, Message as ClientMessage, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as UpstreamCloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::core::credentials::{ConfigProvider, CredentialSet};
use crate::core::introspect::Introspector;
use crate::core::protocol::{Compression, ProtocolVariant};
use crate::core::upstream;

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;
/// Application range; 1014 is not accepted by every WebSocket stack.
pub const CLOSE_UPSTREAM_REJECTED: u16 = 4502;

/// Upper bound on sending a closing frame to a peer that stopped reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Relaying,
    Closing,
    Closed,
}

/// The first reason the session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    ClientClosed,
    UpstreamClosed,
    ClientError(String),
    UpstreamError(String),
    Shutdown,
    /// The session never reached `Relaying`.
    Failed(SessionError),
}

impl CloseCause {
    /// Close code and reason sent to the browser.
    pub fn client_close(&self) -> (u16, &'static str) {
        match self {
            CloseCause::ClientClosed | CloseCause::Shutdown => (CLOSE_NORMAL, "Session Closed"),
            CloseCause::UpstreamClosed => (CLOSE_GOING_AWAY, "Upstream Closed"),
            CloseCause::ClientError(_) | CloseCause::UpstreamError(_) => {
                (CLOSE_INTERNAL_ERROR, "Relay Error")
            }
            CloseCause::Failed(SessionError::ConfigMissing(_)) => {
                (CLOSE_POLICY_VIOLATION, "Server Config Missing")
            }
            CloseCause::Failed(SessionError::UpstreamRejected { .. }) => {
                (CLOSE_UPSTREAM_REJECTED, "Upstream Rejected")
            }
            CloseCause::Failed(SessionError::UpstreamConnect(_)) => {
                (CLOSE_INTERNAL_ERROR, "Upstream Connect Failed")
            }
            CloseCause::Failed(SessionError::Io(_)) => (CLOSE_INTERNAL_ERROR, "Relay Error"),
        }
    }

    /// Close code sent to the upstream.
    pub fn upstream_close_code(&self) -> u16 {
        match self {
            CloseCause::ClientError(_) | CloseCause::UpstreamError(_) => CLOSE_INTERNAL_ERROR,
            _ => CLOSE_NORMAL,
        }
    }
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseCause::ClientClosed => f.write_str("client closed"),
            CloseCause::UpstreamClosed => f.write_str("upstream closed"),
            CloseCause::ClientError(e) => write!(f, "client error: {e}"),
            CloseCause::UpstreamError(e) => write!(f, "upstream error: {e}"),
            CloseCause::Shutdown => f.write_str("shutdown"),
            CloseCause::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Per-service knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub variant: ProtocolVariant,
    pub upstream_url: String,
    pub compression: Compression,
    pub connect_timeout: Duration,
}

/// Final account of a session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub variant: ProtocolVariant,
    pub state: SessionState,
    pub cause: CloseCause,
    pub upstream_attempted: bool,
    pub stats: StatsSnapshot,
}

/// Run a full session on an accepted browser socket.
pub async fn run_session(
    client: WebSocket,
    settings: SessionSettings,
    provider: Arc<dyn ConfigProvider>,
    shutdown: CancellationToken,
) -> SessionReport {
    let session = Session::new(settings, shutdown);
    let span = info_span!(
        "proxy_session",
        session_id = %session.id,
        service = %session.settings.variant
    );
    session.run(client, provider).instrument(span).await
}

struct Session {
    id: Uuid,
    settings: SessionSettings,
    state: SessionState,
    stats: Arc<SessionStats>,
    cancel: CancellationToken,
    upstream_attempted: bool,
}

impl Session {
    fn new(settings: SessionSettings, shutdown: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            settings,
            state: SessionState::Connecting,
            stats: Arc::new(SessionStats::default()),
            cancel: shutdown.child_token(),
            upstream_attempted: false,
        }
    }

    fn transition(&mut self, to: SessionState) {
        debug!(from = ?self.state, to = ?to, "Session state");
        self.state = to;
    }

    async fn run(mut self, client: WebSocket, provider: Arc<dyn ConfigProvider>) -> SessionReport {
        info!("Client connected");
        let variant = self.settings.variant;
        let (mut client_tx, client_rx) = client.split();

        let mapping = provider.get(variant).await;
        let credentials = match CredentialSet::from_mapping(variant, &mapping) {
            Ok(credentials) => credentials,
            Err(e) => {
                error!(error = %e, "Refusing session");
                return self.abort(&mut client_tx, CloseCause::Failed(e)).await;
            }
        };
        info!(app_id = %credentials.app_id_hint(), cluster = %credentials.cluster, "Credentials loaded");

        self.upstream_attempted = true;
        let url = self.settings.upstream_url.clone();
        let cancel = self.cancel.clone();
        let connect =
            upstream::connect(variant, &url, &credentials, self.settings.connect_timeout);
        let upstream = tokio::select! {
            _ = cancel.cancelled() => {
                return self.abort(&mut client_tx, CloseCause::Shutdown).await;
            }
            result = connect => result,
        };
        let upstream = match upstream {
            Ok(socket) => socket,
            Err(e) => {
                error!(error = %e, "Upstream connection failed");
                return self.abort(&mut client_tx, CloseCause::Failed(e)).await;
            }
        };

        self.transition(SessionState::Relaying);
        let (upstream_tx, upstream_rx) = upstream.split();
        let cause: Arc<OnceLock<CloseCause>> = Arc::new(OnceLock::new());
        let router = ClientFrameRouter::new(variant, credentials, self.settings.compression);
        let (introspector, introspect_task) = Introspector::spawn(variant, self.stats.clone());

        let client_task = {
            let (stats, cancel, cause) = (self.stats.clone(), self.cancel.clone(), cause.clone());
            tokio::spawn(
                async move {
                    let (sink, exit) =
                        client_to_upstream(client_rx, upstream_tx, &router, &stats, &cancel).await;
                    debug!(exit = ?exit, "Client pump stopped");
                    let recorded = match exit {
                        PumpExit::SourceClosed => Some(CloseCause::ClientClosed),
                        PumpExit::SourceError(e) => Some(CloseCause::ClientError(e)),
                        PumpExit::SinkError(e) => Some(CloseCause::UpstreamError(e)),
                        PumpExit::Cancelled => None,
                    };
                    if let Some(recorded) = recorded {
                        let _ = cause.set(recorded);
                    }
                    cancel.cancel();
                    sink
                }
                .in_current_span(),
            )
        };

        let upstream_task = {
            let (stats, cancel, cause) = (self.stats.clone(), self.cancel.clone(), cause.clone());
            tokio::spawn(
                async move {
                    let (sink, exit) =
                        upstream_to_client(upstream_rx, client_tx, &introspector, &stats, &cancel)
                            .await;
                    debug!(exit = ?exit, "Upstream pump stopped");
                    let recorded = match exit {
                        PumpExit::SourceClosed => Some(CloseCause::UpstreamClosed),
                        PumpExit::SourceError(e) => Some(CloseCause::UpstreamError(e)),
                        PumpExit::SinkError(e) => Some(CloseCause::ClientError(e)),
                        PumpExit::Cancelled => None,
                    };
                    if let Some(recorded) = recorded {
                        let _ = cause.set(recorded);
                    }
                    cancel.cancel();
                    sink
                }
                .in_current_span(),
            )
        };

        let (upstream_sink, client_sink) = tokio::join!(client_task, upstream_task);
        let cause = cause.get_or_init(|| CloseCause::Shutdown).clone();

        self.transition(SessionState::Closing);
        match upstream_sink {
            Ok(mut sink) if cause != CloseCause::UpstreamClosed => {
                let frame = UpstreamCloseFrame {
                    code: CloseCode::from(cause.upstream_close_code()),
                    reason: "".into(),
                };
                close_leg(&mut sink, UpstreamMessage::Close(Some(frame)), "upstream").await;
            }
            Ok(mut sink) => release_leg::<_, UpstreamMessage>(&mut sink, "upstream").await,
            Err(e) => error!(error = %e, "Client pump task failed"),
        }
        match client_sink {
            Ok(mut sink) if cause != CloseCause::ClientClosed => {
                let (code, reason) = cause.client_close();
                let frame = ClientCloseFrame {
                    code,
                    reason: reason.into(),
                };
                close_leg(&mut sink, ClientMessage::Close(Some(frame)), "client").await;
            }
            Ok(mut sink) => release_leg::<_, ClientMessage>(&mut sink, "client").await,
            Err(e) => error!(error = %e, "Upstream pump task failed"),
        }

        if let Err(e) = introspect_task.await {
            warn!(error = %e, "Introspection task failed");
        }
        self.finish(cause)
    }

    /// End a session that never started relaying.
    async fn abort<K>(mut self, client_tx: &mut K, cause: CloseCause) -> SessionReport
    where
        K: Sink<ClientMessage> + Unpin,
        K::Error: fmt::Display,
    {
        self.transition(SessionState::Closing);
        let (code, reason) = cause.client_close();
        let frame = ClientCloseFrame {
            code,
            reason: reason.into(),
        };
        close_leg(client_tx, ClientMessage::Close(Some(frame)), "client").await;
        self.finish(cause)
    }

    fn finish(mut self, cause: CloseCause) -> SessionReport {
        self.transition(SessionState::Closed);
        let stats = self.stats.snapshot();
        info!(
            cause = %cause,
            client_frames = stats.client_frames,
            client_bytes = stats.client_bytes,
            upstream_frames = stats.upstream_frames,
            upstream_bytes = stats.upstream_bytes,
            raw_forwarded = stats.raw_forwarded,
            dropped = stats.dropped,
            introspection_skipped = stats.introspection_skipped,
            "Session ended"
        );
        SessionReport {
            session_id: self.id,
            variant: self.settings.variant,
            state: self.state,
            cause,
            upstream_attempted: self.upstream_attempted,
            stats,
        }
    }
}

/// Send a close frame and flush, bounded by [`CLOSE_TIMEOUT`].
async fn close_leg<K, M>(sink: &mut K, close: M, leg: &'static str)
where
    K: Sink<M> + Unpin,
    K::Error: fmt::Display,
{
    let closing = async {
        sink.send(close).await?;
        sink.close().await
    };
    match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
        Ok(Ok(())) => debug!(leg, "Leg closed"),
        Ok(Err(e)) => debug!(leg, error = %e, "Leg already gone"),
        Err(_) => warn!(leg, "Timed out closing leg"),
    }
}

/// Flush the reply to a close the peer started, bounded by [`CLOSE_TIMEOUT`].
async fn release_leg<K, M>(sink: &mut K, leg: &'static str)
where
    K: Sink<M> + Unpin,
    K::Error: fmt::Display,
{
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => debug!(leg, "Close handshake completed"),
        Ok(Err(e)) => debug!(leg, error = %e, "Leg already gone"),
        Err(_) => warn!(leg, "Timed out completing close handshake"),
    }
}
