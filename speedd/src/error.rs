use thiserror::Error;

/// Failures at the byte level of the protocol.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum WireError {
    #[error("malformed message framing")]
    MalformedFraming,
    #[error("illegal message: 0x{tag:02X}")]
    UnknownType { tag: u8 },
    #[error("string length exceeds available bytes")]
    StringEncoding,
    #[error("string exceeds 255 bytes")]
    StringTooLong,
}

/// A client action the protocol declares an error. The display string is
/// sent to the client verbatim inside an Error frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum Violation {
    #[error("client has already identified itself")]
    AlreadyIdentified,
    #[error("multiple WantHeartbeat messages")]
    MultipleWantHeartbeat,
    #[error("illegal message: 0x{0:02X}")]
    IllegalMessage(u8),
}

/// Everything that can end a connection.
#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error(transparent)]
    Protocol(#[from] Violation),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),
    #[error("resource: {0}")]
    Resource(String),
}

impl SessionError {
    /// The Error frame to emit before disconnecting, if any. Transport and
    /// resource failures terminate the connection silently.
    pub(crate) fn error_frame(&self) -> Option<String> {
        match self {
            Self::Protocol(violation) => Some(violation.to_string()),
            Self::Wire(wire) => Some(wire.to_string()),
            Self::Transport(_) | Self::Resource(_) => None,
        }
    }
}
