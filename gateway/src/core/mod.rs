pub mod credentials;
pub mod introspect;
pub mod protocol;
pub mod session;
pub mod transform;
pub mod upstream;

// Re-export commonly used types for convenience
pub use credentials::{ConfigProvider, CredentialSet, ServiceKind, StaticConfigProvider};
pub use introspect::{Introspector, Observation, inspect};
pub use protocol::{
    Compression, Flags, Frame, FrameError, MessageType, ProtocolVariant, Serialization,
};
pub use session::{
    CloseCause, SessionError, SessionReport, SessionSettings, SessionState, run_session,
};
pub use transform::{inject_credentials, try_inject_credentials};
