//! Mock speech service backends
//!
//! Stands in for the upstream ASR/TTS WebSocket endpoints so relay tests run
//! without network access. Each server records what it receives and can be
//! told to reply, hang up, or refuse the handshake.

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod websocket_mock;

pub use websocket_mock::{MockUpstream, UpstreamBehavior};
