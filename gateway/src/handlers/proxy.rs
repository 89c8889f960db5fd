//! Speech proxy WebSocket handlers
//!
//! Each endpoint upgrades the browser connection and hands the socket to a
//! proxy session for its service. The session owns both legs from then on.

use axum::{
    Extension,
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::protocol::ProtocolVariant;
use crate::core::session::run_session;
use crate::middleware::ClientIp;
use crate::state::{AppState, ConnectionGuard};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// ASR proxy WebSocket handler
pub async fn asr_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    guard: Option<Extension<Arc<ConnectionGuard>>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let client_ip = client_ip.map(|Extension(ClientIp(ip))| ip.to_string());
    upgrade(ws, state, guard.map(|Extension(g)| g), client_ip, ProtocolVariant::Asr)
}

/// TTS proxy WebSocket handler
pub async fn tts_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    guard: Option<Extension<Arc<ConnectionGuard>>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let client_ip = client_ip.map(|Extension(ClientIp(ip))| ip.to_string());
    upgrade(ws, state, guard.map(|Extension(g)| g), client_ip, ProtocolVariant::Tts)
}

fn upgrade(
    ws: WebSocketUpgrade,
    state: Arc<AppState>,
    guard: Option<Arc<ConnectionGuard>>,
    client_ip: Option<String>,
    variant: ProtocolVariant,
) -> Response {
    debug!(service = %variant, client_ip = ?client_ip, "Proxy WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_proxy_socket(socket, state, guard, client_ip, variant))
}

async fn handle_proxy_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    guard: Option<Arc<ConnectionGuard>>,
    client_ip: Option<String>,
    variant: ProtocolVariant,
) {
    let settings = state.config.session_settings(variant);
    let report = run_session(
        socket,
        settings,
        state.provider.clone(),
        state.shutdown.clone(),
    )
    .await;

    info!(
        session_id = %report.session_id,
        service = %report.variant,
        cause = %report.cause,
        client_ip = ?client_ip,
        "Proxy session closed"
    );
    drop(guard);
}
