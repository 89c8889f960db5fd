use thiserror::Error;

/// Connection-scope failures. Each one ends the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A required credential key is absent or empty.
    #[error("Server config missing: {0}")]
    ConfigMissing(String),

    /// The upstream answered the handshake with a non-101 status.
    #[error("Upstream rejected handshake with HTTP {status}")]
    UpstreamRejected { status: u16 },

    /// TCP/TLS failure, timeout or malformed upstream request.
    #[error("Upstream connection failed: {0}")]
    UpstreamConnect(String),

    #[error("I/O error: {0}")]
    Io(String),
}
