//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `proxy` - ASR and TTS proxy WebSocket endpoints

pub mod api;
pub mod proxy;

// Re-export commonly used handlers for convenient access
pub use proxy::{asr_ws_handler, tts_ws_handler};
