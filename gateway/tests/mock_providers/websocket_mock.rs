//! Mock upstream speech WebSocket server
//!
//! Accepts connections on an ephemeral port and records the handshake
//! headers, every binary frame and any close code it receives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

/// Log id the mock returns in its handshake response.
pub const MOCK_LOG_ID: &str = "mock-logid-0001";

/// How the mock reacts to a connection.
#[derive(Debug, Clone)]
pub enum UpstreamBehavior {
    /// Answer every binary frame with the same bytes.
    Reply(Bytes),
    /// Record frames and never answer.
    Silent,
    /// Send a normal close after this many binary frames, then wait for the
    /// peer's reply.
    CloseAfter(usize),
    /// Refuse the handshake with this HTTP status.
    Reject(u16),
}

/// What the mock has seen so far.
#[derive(Debug, Default)]
pub struct MockUpstreamStats {
    pub connection_count: AtomicU64,
    pub frames: Mutex<Vec<Bytes>>,
    pub handshakes: Mutex<Vec<HashMap<String, String>>>,
    pub close_codes: Mutex<Vec<Option<u16>>>,
}

/// Running mock server. Dropping it leaves the accept task running until the
/// test runtime stops.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub stats: Arc<MockUpstreamStats>,
}

impl MockUpstream {
    pub async fn start(behavior: UpstreamBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream address");
        let stats = Arc::new(MockUpstreamStats::default());

        let accept_stats = stats.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_stats.connection_count.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle_connection(
                    stream,
                    accept_stats.clone(),
                    behavior.clone(),
                ));
            }
        });

        Self { addr, stats }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub fn connections(&self) -> u64 {
        self.stats.connection_count.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> Vec<Bytes> {
        self.stats.frames.lock().unwrap().clone()
    }

    /// Handshake headers of the first connection, keyed by lowercase name.
    pub fn first_handshake(&self) -> Option<HashMap<String, String>> {
        self.stats.handshakes.lock().unwrap().first().cloned()
    }

    pub fn close_codes(&self) -> Vec<Option<u16>> {
        self.stats.close_codes.lock().unwrap().clone()
    }

    /// Poll until at least `count` frames arrived or `limit` elapses.
    pub async fn wait_for_frames(&self, count: usize, limit: Duration) -> Vec<Bytes> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let frames = self.frames();
            if frames.len() >= count || tokio::time::Instant::now() >= deadline {
                return frames;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until a close frame was seen or `limit` elapses. For
    /// `CloseAfter` this is the peer's reply to the mock's own close.
    pub async fn wait_for_close(&self, limit: Duration) -> Option<Option<u16>> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            if let Some(code) = self.close_codes().first().copied() {
                return Some(code);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    stats: Arc<MockUpstreamStats>,
    behavior: UpstreamBehavior,
) {
    let reject = match behavior {
        UpstreamBehavior::Reject(status) => Some(status),
        _ => None,
    };
    let handshake_stats = stats.clone();
    let callback = move |request: &Request,
                         mut response: Response|
          -> Result<Response, ErrorResponse> {
        let headers = request
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        handshake_stats.handshakes.lock().unwrap().push(headers);

        if let Some(status) = reject {
            let mut error = ErrorResponse::new(Some("rejected".to_string()));
            *error.status_mut() = StatusCode::from_u16(status).unwrap();
            return Err(error);
        }
        response
            .headers_mut()
            .insert("x-tt-logid", HeaderValue::from_static(MOCK_LOG_ID));
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    let (mut write, mut read) = ws_stream.split();
    let mut received = 0usize;

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                stats.frames.lock().unwrap().push(data);
                received += 1;
                match &behavior {
                    UpstreamBehavior::Reply(reply) => {
                        if write.send(Message::Binary(reply.clone())).await.is_err() {
                            break;
                        }
                    }
                    // Keep reading so the peer's close reply gets recorded.
                    UpstreamBehavior::CloseAfter(limit) if received == *limit => {
                        let _ = write
                            .send(Message::Close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: "done".into(),
                            })))
                            .await;
                    }
                    _ => {}
                }
            }
            Ok(Message::Close(frame)) => {
                stats
                    .close_codes
                    .lock()
                    .unwrap()
                    .push(frame.map(|f| u16::from(f.code)));
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
}
