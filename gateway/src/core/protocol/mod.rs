//! Shared binary codec for the ASR and TTS upstream protocols.

pub mod compression;
pub mod error;
pub mod frame;
pub mod variant;

pub use compression::{compress, gzip_compress, gzip_decompress};
pub use error::FrameError;
pub use frame::Frame;
pub use variant::{Compression, Flags, MessageType, ProtocolVariant, Serialization};
