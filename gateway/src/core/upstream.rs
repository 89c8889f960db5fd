//! Outbound connection to the speech service.

use std::time::Duration;

use http::HeaderValue;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config, tungstenite};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::credentials::CredentialSet;
use crate::core::protocol::ProtocolVariant;
use crate::core::session::SessionError;

pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frame and message limit on the upstream leg (10 MB).
pub const MAX_UPSTREAM_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Provider log id returned on the handshake response.
pub const LOG_ID_HEADER: &str = "x-tt-logid";

fn header_value(value: &str) -> Result<HeaderValue, SessionError> {
    HeaderValue::from_str(value)
        .map_err(|e| SessionError::UpstreamConnect(format!("invalid header value: {e}")))
}

/// Build the handshake request with the service's authentication headers.
pub fn build_request(
    variant: ProtocolVariant,
    url: &str,
    credentials: &CredentialSet,
) -> Result<Request, SessionError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| SessionError::UpstreamConnect(format!("invalid upstream request: {e}")))?;
    let headers = request.headers_mut();

    match variant {
        ProtocolVariant::Asr => {
            headers.insert("X-Api-Resource-Id", header_value(&credentials.resource_id)?);
            headers.insert(
                "X-Api-Request-Id",
                header_value(&Uuid::new_v4().to_string())?,
            );
            headers.insert("X-Api-Access-Key", header_value(&credentials.token)?);
            headers.insert("X-Api-App-Key", header_value(&credentials.app_id)?);
        }
        ProtocolVariant::Tts => {
            // The provider expects a semicolon, not a space.
            headers.insert(
                http::header::AUTHORIZATION,
                header_value(&format!("Bearer;{}", credentials.token))?,
            );
        }
    }

    Ok(request)
}

/// Connect and complete the handshake within `timeout`.
pub async fn connect(
    variant: ProtocolVariant,
    url: &str,
    credentials: &CredentialSet,
    timeout: Duration,
) -> Result<UpstreamSocket, SessionError> {
    let request = build_request(variant, url, credentials)?;
    let config = WebSocketConfig::default()
        .max_frame_size(Some(MAX_UPSTREAM_FRAME_SIZE))
        .max_message_size(Some(MAX_UPSTREAM_FRAME_SIZE));

    debug!(url, "Connecting to upstream");
    let handshake = connect_async_with_config(request, Some(config), false);
    let (socket, response) = match tokio::time::timeout(timeout, handshake).await {
        Err(_) => {
            return Err(SessionError::UpstreamConnect(format!(
                "handshake timed out after {}s",
                timeout.as_secs_f32()
            )));
        }
        Ok(Err(tungstenite::Error::Http(response))) => {
            return Err(SessionError::UpstreamRejected {
                status: response.status().as_u16(),
            });
        }
        Ok(Err(e)) => return Err(SessionError::UpstreamConnect(e.to_string())),
        Ok(Ok(pair)) => pair,
    };

    let log_id = response
        .headers()
        .get(LOG_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("N/A");
    info!(url, log_id, "Connected to upstream");

    Ok(socket)
}
