//! The two forwarding loops of a session.
//!
//! Each pump owns one half of each socket, runs until its source ends, a
//! write fails or the session token is cancelled, and hands its sink back so
//! the session can send the closing frame.

use std::fmt::Display;

use axum::extract::ws::Message as ClientMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::router::{ClientFrameRouter, RouteDecision, sample_audio_log};
use super::stats::SessionStats;
use crate::core::introspect::Introspector;
use crate::core::protocol::{Frame, MessageType};

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpExit {
    /// The source closed or ended.
    SourceClosed,
    /// Reading from the source failed.
    SourceError(String),
    /// Writing to the destination failed.
    SinkError(String),
    /// The session token was cancelled.
    Cancelled,
}

/// Send `message`, giving up if the session is cancelled first.
async fn send_or_cancel<K, M>(
    sink: &mut K,
    message: M,
    cancel: &CancellationToken,
) -> Result<(), PumpExit>
where
    K: Sink<M> + Unpin,
    K::Error: Display,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PumpExit::Cancelled),
        sent = sink.send(message) => sent.map_err(|e| PumpExit::SinkError(e.to_string())),
    }
}

/// Browser to upstream: route every binary frame through `router`.
pub async fn client_to_upstream<S, E, K>(
    mut client_rx: S,
    mut upstream_tx: K,
    router: &ClientFrameRouter,
    stats: &SessionStats,
    cancel: &CancellationToken,
) -> (K, PumpExit)
where
    S: Stream<Item = Result<ClientMessage, E>> + Unpin,
    E: Display,
    K: Sink<UpstreamMessage> + Unpin,
    K::Error: Display,
{
    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpExit::Cancelled,
            next = client_rx.next() => next,
        };

        let data = match next {
            None | Some(Ok(ClientMessage::Close(_))) => break PumpExit::SourceClosed,
            Some(Err(e)) => break PumpExit::SourceError(e.to_string()),
            Some(Ok(ClientMessage::Binary(data))) => data,
            Some(Ok(ClientMessage::Text(text))) => {
                warn!(bytes = text.as_str().len(), "Ignoring text message from client");
                stats.record_drop();
                continue;
            }
            Some(Ok(_)) => continue,
        };

        let ordinal = stats.record_client_frame(data.len());
        let outgoing = match router.route(data, ordinal) {
            RouteDecision::Rewritten(bytes) => bytes,
            RouteDecision::Passthrough(bytes) => {
                stats.record_raw_forward();
                bytes
            }
            RouteDecision::Drop(e) => {
                warn!(ordinal, error = %e, "Dropping client frame");
                stats.record_drop();
                continue;
            }
        };

        let is_audio = Frame::peek_route(router.variant(), &outgoing)
            .is_ok_and(|(t, _)| t == MessageType::AudioOnly);
        if !is_audio || sample_audio_log(ordinal) {
            debug!(ordinal, bytes = outgoing.len(), audio = is_audio, "Client -> upstream");
        }

        if let Err(exit) =
            send_or_cancel(&mut upstream_tx, UpstreamMessage::Binary(outgoing), cancel).await
        {
            break exit;
        }
    };
    (upstream_tx, exit)
}

/// Upstream to browser: forward the original bytes, observe on the side.
pub async fn upstream_to_client<S, E, K>(
    mut upstream_rx: S,
    mut client_tx: K,
    introspector: &Introspector,
    stats: &SessionStats,
    cancel: &CancellationToken,
) -> (K, PumpExit)
where
    S: Stream<Item = Result<UpstreamMessage, E>> + Unpin,
    E: Display,
    K: Sink<ClientMessage> + Unpin,
    K::Error: Display,
{
    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpExit::Cancelled,
            next = upstream_rx.next() => next,
        };

        let outgoing = match next {
            None | Some(Ok(UpstreamMessage::Close(_))) => break PumpExit::SourceClosed,
            Some(Err(e)) => break PumpExit::SourceError(e.to_string()),
            Some(Ok(UpstreamMessage::Binary(data))) => {
                stats.record_upstream_frame(data.len());
                introspector.offer(data.clone());
                ClientMessage::Binary(data)
            }
            Some(Ok(UpstreamMessage::Text(text))) => {
                stats.record_upstream_frame(text.as_str().len());
                debug!(bytes = text.as_str().len(), "Upstream text message");
                ClientMessage::Text(text.as_str().into())
            }
            Some(Ok(_)) => continue,
        };

        if let Err(exit) = send_or_cancel(&mut client_tx, outgoing, cancel).await {
            break exit;
        }
    };
    (client_tx, exit)
}
