//! Observation of upstream frames for operator logs.
//!
//! Frames arrive over a bounded side channel so that decoding and logging
//! never hold up the forwarding pump. Nothing here can fail the session.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info};

use crate::core::protocol::{Frame, MessageType, ProtocolVariant};
use crate::core::session::SessionStats;

/// Capacity of the per-session introspection queue.
pub const INTROSPECTION_QUEUE_SIZE: usize = 64;

const SUMMARY_CHARS: usize = 200;

/// What could be learned from one upstream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// ASR recognition result.
    Recognition { text: String, is_final: bool },
    /// TTS audio chunk.
    Audio {
        bytes: usize,
        sequence: Option<i32>,
    },
    /// Any other decodable response, summarized.
    Response {
        message_type: MessageType,
        sequence: Option<i32>,
        event: Option<i32>,
        summary: String,
    },
    Error { code: u32, message: String },
    Undecodable { bytes: usize, reason: String },
}

/// Decode one upstream frame. Pure; never panics on bad input.
pub fn inspect(variant: ProtocolVariant, data: &[u8]) -> Observation {
    let frame = match Frame::decode(variant, data) {
        Ok(frame) => frame,
        Err(e) => {
            return Observation::Undecodable {
                bytes: data.len(),
                reason: e.to_string(),
            };
        }
    };

    match frame.message_type {
        MessageType::Error => Observation::Error {
            code: frame.error_code.unwrap_or_default(),
            message: error_message(&frame.payload),
        },
        MessageType::AudioOnlyResponse if variant == ProtocolVariant::Tts => Observation::Audio {
            bytes: frame.payload.len(),
            sequence: frame.sequence,
        },
        MessageType::FullResponse if variant == ProtocolVariant::Asr => {
            recognition(&frame.payload).unwrap_or_else(|| summarize(&frame))
        }
        _ => summarize(&frame),
    }
}

fn recognition(payload: &[u8]) -> Option<Observation> {
    let json: Value = serde_json::from_slice(payload).ok()?;
    let result = json.get("result")?;
    let text = result.get("text")?.as_str()?;
    if text.is_empty() {
        return None;
    }
    let utterance_end = result
        .get("utterance_end")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let definite = result
        .get("utterances")
        .and_then(Value::as_array)
        .is_some_and(|items| {
            items
                .iter()
                .any(|u| u.get("definite").and_then(Value::as_bool) == Some(true))
        });
    Some(Observation::Recognition {
        text: text.to_string(),
        is_final: utterance_end || definite,
    })
}

fn error_message(payload: &[u8]) -> String {
    let raw = String::from_utf8_lossy(payload);
    serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| raw.into_owned())
}

fn summarize(frame: &Frame) -> Observation {
    let body = match frame.event() {
        Some(_) => &frame.payload[4..],
        None => &frame.payload[..],
    };
    Observation::Response {
        message_type: frame.message_type,
        sequence: frame.sequence,
        event: frame.event(),
        summary: String::from_utf8_lossy(body).chars().take(SUMMARY_CHARS).collect(),
    }
}

fn log_observation(index: u64, observation: &Observation) {
    match observation {
        Observation::Recognition { text, is_final: true } => {
            info!(index, text = %text, "Final recognition")
        }
        Observation::Recognition { text, .. } => debug!(index, text = %text, "Partial recognition"),
        Observation::Audio { bytes, sequence } => {
            debug!(index, bytes, sequence = ?sequence, "Audio chunk")
        }
        Observation::Response {
            message_type,
            sequence,
            event,
            summary,
        } => debug!(
            index,
            message_type = %message_type,
            sequence = ?sequence,
            event = ?event,
            summary = %summary,
            "Upstream response"
        ),
        Observation::Error { code, message } => {
            error!(index, code, message = %message, "Upstream error frame")
        }
        Observation::Undecodable { bytes, reason } => {
            debug!(index, bytes, reason = %reason, "Upstream frame not decodable")
        }
    }
}

/// Producer half of the side channel, held by the upstream pump.
#[derive(Clone)]
pub struct Introspector {
    tx: mpsc::Sender<Bytes>,
    stats: Arc<SessionStats>,
}

impl Introspector {
    /// Start the consumer task inside the current tracing span.
    pub fn spawn(variant: ProtocolVariant, stats: Arc<SessionStats>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Bytes>(INTROSPECTION_QUEUE_SIZE);
        let handle = tokio::spawn(
            async move {
                let mut index = 0u64;
                while let Some(data) = rx.recv().await {
                    index += 1;
                    log_observation(index, &inspect(variant, &data));
                }
            }
            .in_current_span(),
        );
        (Self { tx, stats }, handle)
    }

    /// Offer a frame without waiting. Skipped when the queue is full.
    pub fn offer(&self, data: Bytes) {
        if self.tx.try_send(data).is_err() {
            self.stats.record_introspection_skip();
        }
    }
}
