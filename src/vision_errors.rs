//! # Vision Error Types Module
//!
//! Error types returned by the Gemini client.

/// Errors from Gemini requests
#[derive(Debug, Clone)]
pub enum VisionError {
    /// Missing or invalid client settings
    Configuration(String),
    /// Image extension the vision model does not accept
    UnsupportedFormat(String),
    /// Image file could not be read
    ImageRead(String),
    /// Transport failure (connect, timeout, body decode)
    Request(String),
    /// Non-success HTTP status from the API
    Api { status: u16, message: String },
    /// The API answered without any text candidate
    EmptyResponse(String),
    /// The API answered with a body that could not be decoded
    InvalidResponse(String),
    /// Circuit breaker is open after repeated failures
    CircuitOpen(String),
}

impl VisionError {
    /// Whether a retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            VisionError::Request(_) => true,
            VisionError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl std::fmt::Display for VisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisionError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            VisionError::UnsupportedFormat(msg) => write!(f, "Unsupported image format: {msg}"),
            VisionError::ImageRead(msg) => write!(f, "Image read error: {msg}"),
            VisionError::Request(msg) => write!(f, "Request error: {msg}"),
            VisionError::Api { status, message } => write!(f, "API error ({status}): {message}"),
            VisionError::EmptyResponse(msg) => write!(f, "Empty response: {msg}"),
            VisionError::InvalidResponse(msg) => write!(f, "Invalid response: {msg}"),
            VisionError::CircuitOpen(msg) => write!(f, "Circuit open: {msg}"),
        }
    }
}

impl std::error::Error for VisionError {}

impl From<std::io::Error> for VisionError {
    fn from(err: std::io::Error) -> Self {
        VisionError::ImageRead(err.to_string())
    }
}

impl From<reqwest::Error> for VisionError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the API key
        let err = err.without_url();
        if err.is_decode() {
            VisionError::InvalidResponse(err.to_string())
        } else {
            VisionError::Request(err.to_string())
        }
    }
}
