use thiserror::Error;

/// Error taxonomy for the client.
///
/// Option-validation and construction errors are returned to the caller
/// immediately. Errors raised while the send/redirect loop is running are
/// captured on the `Client` and never propagate out of `send()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A malformed option value, rejected at set time.
    #[error("invalid value for option \"{option}\": {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },

    /// No transport handler capability is present in this build.
    #[error("there is no handler available")]
    NoHandlerAvailable,

    /// An explicitly named handler is not available.
    #[error("handler \"{0}\" is not available")]
    HandlerUnavailable(String),

    /// Connection, handshake, or proxy negotiation failure.
    #[error("transport error {code}: {message}")]
    Transport { code: i32, message: String },

    /// Unsupported HTTP verb passed to a convenience constructor.
    #[error("method \"{0}\" is not defined")]
    UnknownMethod(String),

    /// A URL that could not be parsed into a `Uri`.
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    /// A status code outside the 3-digit 100..=599 range.
    #[error("invalid status code: {0}")]
    InvalidStatus(u16),
}

impl ClientError {
    /// Build a transport error with an explicit code.
    pub fn transport(code: i32, message: impl Into<String>) -> Self {
        ClientError::Transport {
            code,
            message: message.into(),
        }
    }

    /// Map an I/O failure into a transport error, keeping the OS errno
    /// as the numeric code when one exists.
    pub fn io(context: &str, err: &std::io::Error) -> Self {
        ClientError::Transport {
            code: err.raw_os_error().unwrap_or(-1),
            message: format!("{context}: {err}"),
        }
    }

    pub fn invalid_option(option: &'static str, reason: impl Into<String>) -> Self {
        ClientError::InvalidOption {
            option,
            reason: reason.into(),
        }
    }
}
