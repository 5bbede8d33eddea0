use thiserror::Error;

/// Failures talking to the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The base URL could not be parsed or the HTTP client could not be built.
    #[error("invalid platform configuration: {0}")]
    Config(String),

    /// Connection refused, DNS failure, timeout and other transport errors.
    #[error("platform unreachable: {0}")]
    Unreachable(String),

    /// The platform refused the caller's credentials.
    #[error("platform rejected credentials: {0}")]
    Unauthorized(String),

    /// Any other non-success response.
    #[error("platform returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected platform response: {0}")]
    Decode(String),
}

