//! Speech proxy WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::proxy::{asr_ws_handler, tts_ws_handler};
use crate::state::AppState;
use std::sync::Arc;

/// Create the proxy WebSocket router
///
/// # Endpoints
///
/// - `GET /api/ws/asr` - speech recognition proxy
/// - `GET /api/ws/tts` - speech synthesis proxy
///
/// # Protocol
///
/// Both endpoints exchange binary frames in the speech service's own framing.
/// Credentials are added by the server; clients never send or receive them.
pub fn create_proxy_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ws/asr", get(asr_ws_handler))
        .route("/api/ws/tts", get(tts_ws_handler))
        .layer(TraceLayer::new_for_http())
}
