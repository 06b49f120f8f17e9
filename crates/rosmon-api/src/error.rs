use std::time::Duration;

/// Errors that can occur while talking to a RouterOS device.
///
/// # Examples
///
/// ```rust
/// use rosmon_api::error::ApiError;
///
/// let err = ApiError::Trap {
///     category: None,
///     message: "no such command".to_string(),
/// };
/// assert!(err.to_string().contains("no such command"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport failure on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device did not answer within the configured deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The command was rejected; the reply carried a `!trap` sentence.
    #[error("device trap: {message}")]
    Trap {
        category: Option<String>,
        message: String,
    },

    /// The device closed the session with a `!fatal` sentence.
    #[error("device fatal error: {0}")]
    Fatal(String),

    /// Malformed length prefix or unexpected reply word.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Device asked for the pre-6.43 challenge/response login.
    #[error("device requires legacy challenge login, which is not supported")]
    UnsupportedLogin,

    #[error("invalid UTF-8 in API word: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, ApiError>;
