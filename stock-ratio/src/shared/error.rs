use thiserror::Error;

/// All errors generated by the ibkr-bridge session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("failed to connect to ibkr-bridge at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("ibkr-bridge handshake failed: {0}")]
    Handshake(String),

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("ibkr-bridge connection closed")]
    ConnectionClosed,

    #[error("session is not connected")]
    NotConnected,

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("ibkr-bridge error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("failed to (de)serialise bridge message: {0}")]
    Serde(String),
}

impl BridgeError {
    /// Determine if an error means the session itself is gone, rather than a
    /// single request failing.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            BridgeError::Connect { .. }
            | BridgeError::Handshake(_)
            | BridgeError::ConnectionClosed
            | BridgeError::NotConnected => true,
            BridgeError::Socket(error_msg) => {
                let error_lower = error_msg.to_lowercase();
                error_lower.contains("connectionclosed")
                    || error_lower.contains("alreadyclosed")
                    || error_lower.contains("io(")
            }
            _ => false,
        }
    }
}

/// Errors that end a monitor session.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("presenter I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BridgeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BridgeError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        // Debug form keeps the variant name that is_terminal matches on
        Self::Socket(format!("{:?}", value))
    }
}
