use std::fmt;
use std::io;

/// Error taxonomy for the connection-pool and request-multiplexing core.
///
/// Every variant that can arise while a `Connection` is leased causes the
/// lease to be released before the error reaches the caller — see
/// `HttpRequest`'s state machine.
#[derive(Debug)]
pub enum ConduitError {
    /// The peer closed the connection before a complete header block
    /// arrived. Recoverable: the Connection is returned to its Pool in a
    /// closed state and will be re-dialed on the next lease.
    Eof,

    /// Low-level I/O failure on connect, send, or read.
    Transport(io::Error),

    /// The TLS handshake itself failed, as distinct from a plain transport
    /// error — useful for callers that want to tell a refused dial from a
    /// certificate/negotiation failure.
    Tls(String),

    /// The response parser rejected the bytes it was fed, or the framing
    /// (Content-Length / chunked) was self-contradictory.
    Protocol(String),

    /// The driving task was cancelled while a lease or permit was held.
    /// Rust's own cancellation model (future drop) unwinds leases
    /// structurally via `LeaseGuard`, so this variant is only surfaced by
    /// code paths that explicitly check for cooperative cancellation.
    Cancelled,

    /// A URL handed to `Session::request` could not be parsed.
    InvalidUrl(url::ParseError),

    /// A URL has no usable host component.
    MissingHost,
}

impl fmt::Display for ConduitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => write!(f, "connection closed before a complete response arrived"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::Tls(err) => write!(f, "TLS error: {err}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Cancelled => write!(f, "request cancelled"),
            Self::InvalidUrl(err) => write!(f, "invalid URL: {err}"),
            Self::MissingHost => write!(f, "URL has no host"),
        }
    }
}

impl std::error::Error for ConduitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::InvalidUrl(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ConduitError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Eof
        } else {
            Self::Transport(err)
        }
    }
}

impl From<url::ParseError> for ConduitError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err)
    }
}

pub type Result<T> = std::result::Result<T, ConduitError>;
