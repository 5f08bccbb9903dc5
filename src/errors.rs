use std::fmt;

/// Errors produced by the management client.
///
/// The variants fall into a few families: configuration problems are
/// rejected before any socket exists, transport problems come from the
/// connection itself, negotiation problems abandon the login handshake,
/// and parsing/format problems mean the raw-mode document stream can no
/// longer be trusted. After any error except the pure configuration
/// checks the session must be closed and discarded.
#[derive(Debug)]
pub enum ClientError {
    /// Device address is not a usable unicast IPv4 host
    Address,

    /// Device port is zero
    Port,

    /// User name contains a newline character
    UserNewline,

    /// Password contains a newline character
    PasswordNewline,

    /// Timeout below the supported minimum
    TimeoutTooSmall,

    /// Timeout above the supported maximum
    TimeoutTooLarge,

    /// Command is empty after leading whitespace
    NoCommand,

    /// Command contains a newline character
    CommandNewline,

    /// TCP connection could not be established
    Connect,

    /// Socket options could not be applied
    Setup,

    /// Socket could not be switched to non-blocking mode
    NonBlocking,

    /// Receive-side transport failure
    Io(std::io::Error),

    /// Send-side transport failure
    Send,

    /// Deadline elapsed before the operation completed
    Timeout,

    /// Peer closed the connection
    Disconnected,

    /// Unrecoverable telnet stream error
    Telnet,

    /// Login prompt reappeared after credentials were sent
    WrongCredentials,

    /// Prompts arrived in an order the handshake cannot accept
    WrongState,

    /// Post-handshake banner is not the expected protocol header
    UnknownProtocol,

    /// Device ignored or rejected the raw mode request
    RawModeNotSupported,

    /// Raw mode was entered but reported a failure code
    RawModeFailed,

    /// Fixed receive window (or parser stack) exhausted
    BufferOverflow,

    /// Document stream ended in the middle of a document
    ResponseEndOfStream,

    /// Document is not well formed
    ResponseSyntax,

    /// Document is well formed but not a valid response
    ResponseFormat,

    /// Internal error
    Internal,
}

impl ClientError {
    /// Stable human-readable message for the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientError::Address => "invalid device address",
            ClientError::Port => "device port is zero",
            ClientError::UserNewline => "user name has a newline character",
            ClientError::PasswordNewline => "password has a newline character",
            ClientError::TimeoutTooSmall => "timeout is too small",
            ClientError::TimeoutTooLarge => "timeout is too large",
            ClientError::NoCommand => "no command specified",
            ClientError::CommandNewline => "command has a newline character",
            ClientError::Connect => "unable to connect to a device",
            ClientError::Setup => "unable to setup a socket",
            ClientError::NonBlocking => "unable to setup a non-blocking connection",
            ClientError::Io(_) => "I/O error",
            ClientError::Send => "data send error",
            ClientError::Timeout => "I/O timeout",
            ClientError::Disconnected => "disconnected by peer",
            ClientError::Telnet => "unrecoverable telnet error",
            ClientError::WrongCredentials => "invalid user name or password",
            ClientError::WrongState => "wrong authentication state",
            ClientError::UnknownProtocol => "unknown telnet protocol",
            ClientError::RawModeNotSupported => "the raw mode not supported",
            ClientError::RawModeFailed => "unable to enter the raw mode",
            ClientError::BufferOverflow => "internal buffer overflow",
            ClientError::ResponseEndOfStream => "unexpected end of stream",
            ClientError::ResponseSyntax => "wrong response syntax",
            ClientError::ResponseFormat => "wrong response format",
            ClientError::Internal => "internal error",
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(err) => write!(f, "I/O error: {}", err),
            other => f.write_str(other.as_str()),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                ClientError::Disconnected
            }
            ErrorKind::TimedOut | ErrorKind::WouldBlock => ClientError::Timeout,
            _ => ClientError::Io(err),
        }
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_has_a_message() {
        let errors = [
            ClientError::Address,
            ClientError::Port,
            ClientError::UserNewline,
            ClientError::PasswordNewline,
            ClientError::TimeoutTooSmall,
            ClientError::TimeoutTooLarge,
            ClientError::NoCommand,
            ClientError::CommandNewline,
            ClientError::Connect,
            ClientError::Setup,
            ClientError::NonBlocking,
            ClientError::Send,
            ClientError::Timeout,
            ClientError::Disconnected,
            ClientError::Telnet,
            ClientError::WrongCredentials,
            ClientError::WrongState,
            ClientError::UnknownProtocol,
            ClientError::RawModeNotSupported,
            ClientError::RawModeFailed,
            ClientError::BufferOverflow,
            ClientError::ResponseEndOfStream,
            ClientError::ResponseSyntax,
            ClientError::ResponseFormat,
            ClientError::Internal,
        ];

        for err in errors {
            assert!(!err.as_str().is_empty());
            assert_eq!(err.to_string(), err.as_str());
        }
    }

    #[test]
    fn test_io_error_display_includes_cause() {
        let err = ClientError::Io(std::io::Error::other("boom"));
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn test_disconnect_kinds_map_to_disconnected() {
        let err: ClientError = std::io::Error::from(std::io::ErrorKind::ConnectionReset).into();
        assert!(matches!(err, ClientError::Disconnected));
    }

    #[test]
    fn test_timeout_kinds_map_to_timeout() {
        let err: ClientError = std::io::Error::from(std::io::ErrorKind::TimedOut).into();
        assert!(matches!(err, ClientError::Timeout));
    }
}
