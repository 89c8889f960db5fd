//! Per-frame routing for the client to upstream direction.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::credentials::CredentialSet;
use crate::core::protocol::{
    Compression, Frame, FrameError, MessageType, ProtocolVariant, Serialization, compress,
};
use crate::core::transform::try_inject_credentials;

/// What to send upstream for one client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Re-encoded frame.
    Rewritten(Bytes),
    /// Original bytes, untouched.
    Passthrough(Bytes),
    /// Not even the routing header could be read.
    Drop(FrameError),
}

/// Decides how each browser frame is forwarded. Holds no I/O.
pub struct ClientFrameRouter {
    variant: ProtocolVariant,
    credentials: CredentialSet,
    compression: Compression,
}

impl ClientFrameRouter {
    pub fn new(
        variant: ProtocolVariant,
        credentials: CredentialSet,
        compression: Compression,
    ) -> Self {
        Self {
            variant,
            credentials,
            compression,
        }
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Route one frame. `ordinal` is the 1-based index of the frame in the
    /// client stream and stands in for a missing audio sequence number.
    pub fn route(&self, data: Bytes, ordinal: u64) -> RouteDecision {
        let (message_type, _) = match Frame::peek_route(self.variant, &data) {
            Ok(route) => route,
            Err(e) => return RouteDecision::Drop(e),
        };

        let rewritten = match message_type {
            MessageType::FullRequest => self.rewrite_control(&data),
            MessageType::AudioOnly => self.rewrite_audio(&data, ordinal),
            other => {
                debug!(message_type = %other, bytes = data.len(), "Forwarding unrecognized frame as-is");
                None
            }
        };

        match rewritten {
            Some(bytes) => RouteDecision::Rewritten(bytes),
            None => RouteDecision::Passthrough(data),
        }
    }

    fn rewrite_control(&self, data: &[u8]) -> Option<Bytes> {
        let frame = match Frame::decode(self.variant, data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Control frame not decodable, forwarding as-is");
                return None;
            }
        };
        if frame.serialization != Serialization::Json || frame.payload.is_empty() {
            return None;
        }
        let Some(payload) = try_inject_credentials(self.variant, &frame.payload, &self.credentials)
        else {
            warn!("Control payload is not a JSON object, forwarding as-is");
            return None;
        };
        let payload = compress(self.compression, &payload).ok()?;

        Some(
            Frame::full_request(payload)
                .with_compression(self.compression)
                .encode(),
        )
    }

    fn rewrite_audio(&self, data: &[u8], ordinal: u64) -> Option<Bytes> {
        let frame = match Frame::decode(self.variant, data) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Audio frame not decodable, forwarding as-is");
                return None;
            }
        };
        let payload = compress(self.compression, &frame.payload).ok()?;

        let out = if self.variant.table().resequence_audio {
            let magnitude = frame
                .sequence
                .map(i32::unsigned_abs)
                .filter(|m| *m > 0)
                .map(u64::from)
                .unwrap_or(ordinal);
            let magnitude = i32::try_from(magnitude).unwrap_or(i32::MAX);
            let sequence = if frame.is_last() { -magnitude } else { magnitude };
            Frame::audio(sequence, payload)
        } else {
            let mut out = Frame::new(MessageType::AudioOnly, frame.flags, payload)
                .with_serialization(frame.serialization);
            if Frame::has_sequence_field(MessageType::AudioOnly, frame.flags) {
                out.sequence = frame.sequence;
            }
            out
        };

        Some(out.with_compression(self.compression).encode())
    }
}

impl std::fmt::Debug for ClientFrameRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFrameRouter")
            .field("variant", &self.variant)
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

/// Whether a client audio frame at `ordinal` should be logged.
pub(crate) fn sample_audio_log(ordinal: u64) -> bool {
    ordinal <= 3 || ordinal % 50 == 0
}
