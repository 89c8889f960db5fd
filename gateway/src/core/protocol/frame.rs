//! Binary frame layout.
//!
//! ```text
//!  byte 0          byte 1          byte 2              byte 3..
//! +-------+-------+-------+-------+---------+---------+-----------------+
//! |version|hdr_sz | type  | flags | serial. | compr.  | padding         |
//! +-------+-------+-------+-------+---------+---------+-----------------+
//! [ sequence: i32 BE  ]  only when flags are Positive/NegativeSequence
//! [ error code: u32 BE ] only when type is Error
//! [ payload length: u32 BE ][ payload ... ]
//! ```
//!
//! `hdr_sz` counts 4-byte words, so the fixed header is followed by
//! `hdr_sz * 4 - 3` padding bytes.

use bytes::{BufMut, Bytes, BytesMut};

use super::compression::gzip_decompress;
use super::error::FrameError;
use super::variant::{
    Compression, DEFAULT_HEADER_SIZE, Flags, MessageType, PROTOCOL_VERSION, ProtocolVariant,
    Serialization,
};

/// One decoded wire frame.
///
/// `compression` describes the wire form. After [`Frame::decode`] the
/// payload is already decompressed; before [`Frame::encode`] the caller must
/// have compressed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: u8,
    pub header_size: u8,
    pub message_type: MessageType,
    pub flags: Flags,
    pub serialization: Serialization,
    pub compression: Compression,
    pub sequence: Option<i32>,
    pub error_code: Option<u32>,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(message_type: MessageType, flags: Flags, payload: impl Into<Bytes>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            header_size: DEFAULT_HEADER_SIZE,
            message_type,
            flags,
            serialization: Serialization::Raw,
            compression: Compression::None,
            sequence: None,
            error_code: None,
            payload: payload.into(),
        }
    }

    /// A JSON control request without a sequence field.
    pub fn full_request(payload: impl Into<Bytes>) -> Self {
        Self::new(MessageType::FullRequest, Flags::NoSequence, payload)
            .with_serialization(Serialization::Json)
    }

    /// An audio chunk carrying `sequence`. Negative values mark the last chunk.
    pub fn audio(sequence: i32, payload: impl Into<Bytes>) -> Self {
        let flags = if sequence < 0 {
            Flags::NegativeSequence
        } else {
            Flags::PositiveSequence
        };
        Self::new(MessageType::AudioOnly, flags, payload).with_sequence(sequence)
    }

    pub fn error(code: u32, payload: impl Into<Bytes>) -> Self {
        let mut frame = Self::new(MessageType::Error, Flags::NoSequence, payload)
            .with_serialization(Serialization::Json);
        frame.error_code = Some(code);
        frame
    }

    pub fn with_sequence(mut self, sequence: i32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_serialization(mut self, serialization: Serialization) -> Self {
        self.serialization = serialization;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Whether the sequence field is on the wire for this type/flags pair.
    pub fn has_sequence_field(message_type: MessageType, flags: Flags) -> bool {
        message_type != MessageType::Error && flags.carries_sequence()
    }

    /// Read just the routing fields from the second header byte.
    ///
    /// This is the only part of a client frame the relay cannot do without.
    pub fn peek_route(
        variant: ProtocolVariant,
        data: &[u8],
    ) -> Result<(MessageType, Flags), FrameError> {
        if data.len() < 2 {
            return Err(FrameError::Truncated {
                offset: 0,
                needed: 2,
                available: data.len(),
            });
        }
        Ok((variant.message_type(data[1] >> 4), variant.flags(data[1] & 0x0f)))
    }

    /// Serialize to wire bytes. Sequenced flags must come with a sequence.
    pub fn encode(&self) -> Bytes {
        let has_sequence = Self::has_sequence_field(self.message_type, self.flags);
        debug_assert!(
            !has_sequence || self.sequence.is_some(),
            "{:?} frame with {:?} flags has no sequence",
            self.message_type,
            self.flags
        );
        let header_size = self.header_size.clamp(1, 0x0f);
        let header_len = header_size as usize * 4;
        let mut buf = BytesMut::with_capacity(header_len + 12 + self.payload.len());

        buf.put_u8(((self.version & 0x0f) << 4) | header_size);
        buf.put_u8((self.message_type.code() << 4) | self.flags.code());
        buf.put_u8((self.serialization.code() << 4) | self.compression.code());
        buf.put_bytes(0, header_len - 3);

        if has_sequence {
            buf.put_i32(self.sequence.unwrap_or(0));
        }
        if self.message_type == MessageType::Error {
            buf.put_u32(self.error_code.unwrap_or(0));
        }

        buf.put_u32(self.payload.len() as u32);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Decode a frame, gunzipping the payload when the header says so.
    pub fn decode(variant: ProtocolVariant, data: &[u8]) -> Result<Self, FrameError> {
        let mut frame = Self::decode_wire(variant, data)?;
        if frame.compression == Compression::Gzip {
            frame.payload = Bytes::from(gzip_decompress(&frame.payload)?);
        }
        Ok(frame)
    }

    /// Decode a frame leaving the payload exactly as it appears on the wire.
    pub fn decode_wire(variant: ProtocolVariant, data: &[u8]) -> Result<Self, FrameError> {
        let mut reader = Reader::new(data);

        let [b0, b1, b2] = reader.array::<3>()?;
        let header_size = b0 & 0x0f;
        if header_size == 0 {
            return Err(FrameError::InvalidHeaderSize(header_size));
        }
        reader.skip(header_size as usize * 4 - 3)?;

        let message_type = variant.message_type(b1 >> 4);
        let flags = variant.flags(b1 & 0x0f);

        let sequence = if Self::has_sequence_field(message_type, flags) {
            Some(i32::from_be_bytes(reader.array()?))
        } else {
            None
        };
        let error_code = if message_type == MessageType::Error {
            Some(u32::from_be_bytes(reader.array()?))
        } else {
            None
        };

        let declared = u32::from_be_bytes(reader.array()?) as usize;
        let payload = reader.take(declared)?;
        if reader.remaining() != 0 {
            return Err(FrameError::LengthMismatch {
                declared,
                remaining: declared + reader.remaining(),
            });
        }

        Ok(Self {
            version: b0 >> 4,
            header_size,
            message_type,
            flags,
            serialization: Serialization::from_code(b2 >> 4),
            compression: Compression::from_code(b2 & 0x0f),
            sequence,
            error_code,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Leading event number of a `WithEvent` payload.
    pub fn event(&self) -> Option<i32> {
        if self.flags != Flags::WithEvent {
            return None;
        }
        let head: [u8; 4] = self.payload.get(..4)?.try_into().ok()?;
        Some(i32::from_be_bytes(head))
    }

    pub fn is_last(&self) -> bool {
        self.flags.is_terminal() || self.sequence.is_some_and(|s| s < 0)
    }
}

/// Bounds-checked cursor over a frame buffer.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FrameError> {
        if self.remaining() < n {
            return Err(FrameError::Truncated {
                offset: self.offset,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), FrameError> {
        self.take(n).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FrameError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::compression::gzip_compress;

    fn json_frame() -> Frame {
        Frame::full_request(&br#"{"request":{"text":"hi"}}"#[..])
    }

    #[test]
    fn test_header_bytes() {
        let bytes = json_frame().encode();
        assert_eq!(bytes[0], 0x11);
        assert_eq!(bytes[1], 0x10);
        assert_eq!(bytes[2], 0x10);
        assert_eq!(bytes[3], 0x00);
        assert_eq!(&bytes[4..8], &(25u32).to_be_bytes());
        assert_eq!(bytes.len(), 8 + 25);
    }

    #[test]
    fn test_roundtrip_json_frames() {
        let frames = [
            json_frame(),
            Frame::audio(3, vec![9u8; 64]).with_serialization(Serialization::Json),
            Frame::error(45000001, &br#"{"message":"bad"}"#[..]),
            Frame::new(MessageType::FullResponse, Flags::PositiveSequence, &b"{}"[..])
                .with_sequence(12)
                .with_serialization(Serialization::Json),
        ];
        for variant in [ProtocolVariant::Asr, ProtocolVariant::Tts] {
            for frame in &frames {
                let decoded = Frame::decode(variant, &frame.encode()).unwrap();
                assert_eq!(&decoded, frame);
            }
        }
    }

    #[test]
    fn test_gzip_payload_is_decompressed_on_decode() {
        let original = br#"{"audio":{"format":"pcm","rate":16000}}"#;
        let frame = Frame::full_request(gzip_compress(original).unwrap())
            .with_compression(Compression::Gzip);
        let decoded = Frame::decode(ProtocolVariant::Asr, &frame.encode()).unwrap();
        assert_eq!(decoded.compression, Compression::Gzip);
        assert_eq!(&decoded.payload[..], &original[..]);
    }

    #[test]
    fn test_sequence_sign_survives() {
        let last = Frame::decode(ProtocolVariant::Asr, &Frame::audio(-7, vec![1, 2, 3]).encode())
            .unwrap();
        assert_eq!(last.flags, Flags::NegativeSequence);
        assert_eq!(last.sequence, Some(-7));
        assert!(last.is_last());

        let mid = Frame::decode(ProtocolVariant::Tts, &Frame::audio(7, vec![1]).encode()).unwrap();
        assert_eq!(mid.flags, Flags::PositiveSequence);
        assert_eq!(mid.sequence, Some(7));
        assert!(!mid.is_last());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "has no sequence")]
    fn test_sequenced_flags_without_sequence_are_rejected() {
        Frame::new(MessageType::AudioOnly, Flags::PositiveSequence, vec![1u8]).encode();
    }

    #[test]
    fn test_asr_last_chunk_with_sequence_does_not_decode() {
        // Header, then a sequence the canonical table does not expect.
        let mut data = vec![0x11, 0x22, 0x00, 0x00];
        data.extend_from_slice(&(-4i32).to_be_bytes());
        data.extend_from_slice(&3u32.to_be_bytes());
        data.extend_from_slice(&[1, 2, 3]);

        assert!(Frame::decode(ProtocolVariant::Asr, &data).is_err());
    }

    #[test]
    fn test_every_prefix_is_truncated() {
        let frames = [
            json_frame(),
            Frame::audio(-2, vec![7u8; 10]),
            Frame::error(1, &b"oops"[..]),
        ];
        for frame in frames {
            let bytes = frame.encode();
            for len in 0..bytes.len() {
                let err = Frame::decode(ProtocolVariant::Asr, &bytes[..len]).unwrap_err();
                assert!(err.is_truncated(), "prefix {len}: {err:?}");
            }
        }
    }

    #[test]
    fn test_trailing_bytes_are_a_length_mismatch() {
        let mut bytes = json_frame().encode().to_vec();
        bytes.extend_from_slice(b"xx");
        assert_eq!(
            Frame::decode(ProtocolVariant::Tts, &bytes).unwrap_err(),
            FrameError::LengthMismatch {
                declared: 25,
                remaining: 27
            }
        );
    }

    #[test]
    fn test_extended_header_padding_is_skipped() {
        let mut frame = json_frame();
        frame.header_size = 2;
        let bytes = frame.encode();
        assert_eq!(bytes.len(), 8 + 4 + 25);
        assert_eq!(Frame::decode(ProtocolVariant::Asr, &bytes).unwrap(), frame);
    }

    #[test]
    fn test_zero_header_size_rejected() {
        let bytes = [0x10, 0x10, 0x10, 0x00, 0, 0, 0, 0];
        assert_eq!(
            Frame::decode(ProtocolVariant::Asr, &bytes).unwrap_err(),
            FrameError::InvalidHeaderSize(0)
        );
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let frame = Frame::new(MessageType::Unknown(0b0111), Flags::NoSequence, &b"zz"[..]);
        let decoded = Frame::decode(ProtocolVariant::Asr, &frame.encode()).unwrap();
        assert_eq!(decoded.message_type, MessageType::Unknown(0b0111));
        assert_eq!(decoded.encode(), frame.encode());
    }

    #[test]
    fn test_bad_gzip_is_decompress_error() {
        let frame = Frame::full_request(&b"not gzip"[..]).with_compression(Compression::Gzip);
        let bytes = frame.encode();
        assert!(matches!(
            Frame::decode(ProtocolVariant::Asr, &bytes),
            Err(FrameError::Decompress(_))
        ));
        assert_eq!(
            Frame::decode_wire(ProtocolVariant::Asr, &bytes).unwrap().payload,
            frame.payload
        );
    }

    #[test]
    fn test_peek_route() {
        let bytes = Frame::audio(1, vec![0]).encode();
        assert_eq!(
            Frame::peek_route(ProtocolVariant::Asr, &bytes).unwrap(),
            (MessageType::AudioOnly, Flags::PositiveSequence)
        );
        assert!(Frame::peek_route(ProtocolVariant::Asr, &bytes[..1]).is_err());
    }

    #[test]
    fn test_event_number() {
        let mut payload = 352i32.to_be_bytes().to_vec();
        payload.extend_from_slice(b"{}");
        let frame = Frame::new(MessageType::FullResponse, Flags::WithEvent, payload);
        let decoded = Frame::decode(ProtocolVariant::Tts, &frame.encode()).unwrap();
        assert_eq!(decoded.event(), Some(352));
        assert_eq!(json_frame().event(), None);
    }
}
