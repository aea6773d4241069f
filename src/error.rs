use std::fmt;

/// Main error type for the Starling broadcast service
#[derive(Debug)]
pub enum StarlingError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Transport layer errors (send/receive failures)
    Transport(String),

    /// A send or RPC attempt that did not complete in time.
    /// This is the only class of error the retry policy treats as retryable.
    Timeout(String),

    /// Protocol violations: unexpected replies, events out of contract order
    Protocol(String),

    /// Serialization/deserialization errors on the wire
    Serialization(serde_json::Error),

    /// System I/O errors
    Io(std::io::Error),
}

impl fmt::Display for StarlingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StarlingError::Config(msg) => write!(f, "Configuration error: {}", msg),
            StarlingError::Transport(msg) => write!(f, "Transport error: {}", msg),
            StarlingError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            StarlingError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            StarlingError::Serialization(err) => write!(f, "Serialization error: {}", err),
            StarlingError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for StarlingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StarlingError::Serialization(err) => Some(err),
            StarlingError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl StarlingError {
    /// Whether a retry of the same operation could plausibly succeed.
    ///
    /// Timeouts are transient by definition; everything else (malformed
    /// payloads, closed transports, config problems) fails identically
    /// on repetition.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StarlingError::Timeout(_))
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            StarlingError::Config(_) => "configuration_error",
            StarlingError::Transport(_) => "transport_error",
            StarlingError::Timeout(_) => "timeout",
            StarlingError::Protocol(_) => "protocol_error",
            StarlingError::Serialization(_) => "serialization_error",
            StarlingError::Io(_) => "io_error",
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, StarlingError>;

// Conversions from common error types
impl From<std::io::Error> for StarlingError {
    fn from(err: std::io::Error) -> Self {
        StarlingError::Io(err)
    }
}

impl From<serde_json::Error> for StarlingError {
    fn from(err: serde_json::Error) -> Self {
        StarlingError::Serialization(err)
    }
}

impl From<tokio::time::error::Elapsed> for StarlingError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        StarlingError::Timeout(err.to_string())
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::StarlingError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::StarlingError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::StarlingError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::StarlingError::Transport(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! protocol_error {
    ($msg:expr) => {
        $crate::error::StarlingError::Protocol($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::StarlingError::Protocol(format!($fmt, $($arg)*))
    };
}
