//! Header tags and the per-service opcode tables.
//!
//! Both services share the same header layout and the same numeric codes
//! for every tag they have in common. What differs is which codes a service
//! recognizes and how the relay re-sequences audio. Codes that a table does
//! not list decode to the `Unknown` tag and survive a round trip unchanged.

use std::fmt;

/// Protocol version written into every frame the relay encodes.
pub const PROTOCOL_VERSION: u8 = 0b0001;

/// Default header size, in 4-byte units.
pub const DEFAULT_HEADER_SIZE: u8 = 0b0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    FullRequest,
    AudioOnly,
    FullResponse,
    /// Audio-only server frame (the ASR service calls it a server ACK).
    AudioOnlyResponse,
    FrontEndResult,
    Error,
    Unknown(u8),
}

impl MessageType {
    pub const fn code(self) -> u8 {
        match self {
            MessageType::FullRequest => 0b0001,
            MessageType::AudioOnly => 0b0010,
            MessageType::FullResponse => 0b1001,
            MessageType::AudioOnlyResponse => 0b1011,
            MessageType::FrontEndResult => 0b1100,
            MessageType::Error => 0b1111,
            MessageType::Unknown(code) => code & 0x0f,
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, MessageType::FullRequest)
    }

    pub fn is_audio(self) -> bool {
        matches!(self, MessageType::AudioOnly)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Unknown(code) => write!(f, "Unknown({code:#06b})"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flags {
    NoSequence,
    PositiveSequence,
    /// Last packet of a stream, no sequence field.
    LastNoSequence,
    /// Last packet of a stream, sequence field holds `-index`.
    NegativeSequence,
    /// Payload starts with a big-endian i32 event number.
    WithEvent,
    Unknown(u8),
}

impl Flags {
    pub const fn code(self) -> u8 {
        match self {
            Flags::NoSequence => 0b0000,
            Flags::PositiveSequence => 0b0001,
            Flags::LastNoSequence => 0b0010,
            Flags::NegativeSequence => 0b0011,
            Flags::WithEvent => 0b0100,
            Flags::Unknown(code) => code & 0x0f,
        }
    }

    /// Whether a frame with these flags carries the 4-byte sequence field.
    pub fn carries_sequence(self) -> bool {
        matches!(self, Flags::PositiveSequence | Flags::NegativeSequence)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Flags::LastNoSequence | Flags::NegativeSequence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Serialization {
    Raw,
    Json,
    Other(u8),
}

impl Serialization {
    pub const fn code(self) -> u8 {
        match self {
            Serialization::Raw => 0b0000,
            Serialization::Json => 0b0001,
            Serialization::Other(code) => code & 0x0f,
        }
    }

    pub const fn from_code(code: u8) -> Self {
        match code & 0x0f {
            0b0000 => Serialization::Raw,
            0b0001 => Serialization::Json,
            other => Serialization::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Gzip,
    Other(u8),
}

impl Compression {
    pub const fn code(self) -> u8 {
        match self {
            Compression::None => 0b0000,
            Compression::Gzip => 0b0001,
            Compression::Other(code) => code & 0x0f,
        }
    }

    pub const fn from_code(code: u8) -> Self {
        match code & 0x0f {
            0b0000 => Compression::None,
            0b0001 => Compression::Gzip,
            other => Compression::Other(other),
        }
    }
}

/// Opcode table for one protocol variant.
#[derive(Debug)]
pub struct VariantTable {
    pub name: &'static str,
    pub message_types: &'static [MessageType],
    pub flags: &'static [Flags],
    /// Audio frames forwarded upstream always carry an explicit sequence;
    /// the final chunk is sent as `NegativeSequence` with `-index`.
    pub resequence_audio: bool,
}

static ASR_TABLE: VariantTable = VariantTable {
    name: "asr",
    message_types: &[
        MessageType::FullRequest,
        MessageType::AudioOnly,
        MessageType::FullResponse,
        MessageType::AudioOnlyResponse,
        MessageType::Error,
    ],
    // 0b0010 is the canonical last-chunk tag with no sequence field. Some
    // older ASR clients write a sequence after it; such frames fail to
    // decode and the relay forwards them as-is.
    flags: &[
        Flags::NoSequence,
        Flags::PositiveSequence,
        Flags::LastNoSequence,
        Flags::NegativeSequence,
    ],
    resequence_audio: true,
};

static TTS_TABLE: VariantTable = VariantTable {
    name: "tts",
    message_types: &[
        MessageType::FullRequest,
        MessageType::AudioOnly,
        MessageType::FullResponse,
        MessageType::AudioOnlyResponse,
        MessageType::FrontEndResult,
        MessageType::Error,
    ],
    flags: &[
        Flags::NoSequence,
        Flags::PositiveSequence,
        Flags::LastNoSequence,
        Flags::NegativeSequence,
        Flags::WithEvent,
    ],
    resequence_audio: false,
};

/// The two upstream protocol variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    Asr,
    Tts,
}

impl ProtocolVariant {
    pub fn table(self) -> &'static VariantTable {
        match self {
            ProtocolVariant::Asr => &ASR_TABLE,
            ProtocolVariant::Tts => &TTS_TABLE,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.table().name
    }

    /// Map a 4-bit message type code to its tag for this variant.
    pub fn message_type(self, code: u8) -> MessageType {
        let code = code & 0x0f;
        self.table()
            .message_types
            .iter()
            .copied()
            .find(|t| t.code() == code)
            .unwrap_or(MessageType::Unknown(code))
    }

    /// Map a 4-bit flags code to its tag for this variant.
    pub fn flags(self, code: u8) -> Flags {
        let code = code & 0x0f;
        self.table()
            .flags
            .iter()
            .copied()
            .find(|f| f.code() == code)
            .unwrap_or(Flags::Unknown(code))
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_codes_resolve_in_both_variants() {
        for variant in [ProtocolVariant::Asr, ProtocolVariant::Tts] {
            assert_eq!(variant.message_type(0b0001), MessageType::FullRequest);
            assert_eq!(variant.message_type(0b0010), MessageType::AudioOnly);
            assert_eq!(variant.message_type(0b1001), MessageType::FullResponse);
            assert_eq!(variant.message_type(0b1111), MessageType::Error);
            assert_eq!(variant.flags(0b0011), Flags::NegativeSequence);
        }
    }

    #[test]
    fn test_tts_only_codes() {
        assert_eq!(
            ProtocolVariant::Tts.message_type(0b1100),
            MessageType::FrontEndResult
        );
        assert_eq!(
            ProtocolVariant::Asr.message_type(0b1100),
            MessageType::Unknown(0b1100)
        );
        assert_eq!(ProtocolVariant::Tts.flags(0b0100), Flags::WithEvent);
        assert_eq!(ProtocolVariant::Asr.flags(0b0100), Flags::Unknown(0b0100));
    }

    #[test]
    fn test_unknown_codes_keep_their_value() {
        let t = ProtocolVariant::Asr.message_type(0b0111);
        assert_eq!(t, MessageType::Unknown(0b0111));
        assert_eq!(t.code(), 0b0111);
        assert_eq!(Flags::Unknown(0b1000).code(), 0b1000);
    }

    #[test]
    fn test_asr_last_chunk_flag_has_no_sequence() {
        let flags = ProtocolVariant::Asr.flags(0b0010);
        assert_eq!(flags, Flags::LastNoSequence);
        assert!(!flags.carries_sequence());
        assert!(flags.is_terminal());
    }

    #[test]
    fn test_sequence_presence() {
        assert!(Flags::PositiveSequence.carries_sequence());
        assert!(Flags::NegativeSequence.carries_sequence());
        assert!(!Flags::LastNoSequence.carries_sequence());
        assert!(!Flags::WithEvent.carries_sequence());
        assert!(Flags::LastNoSequence.is_terminal());
    }
}
