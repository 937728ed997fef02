//! Error types for text generation.

use thiserror::Error;

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Errors that can occur while generating text.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Provider not configured.
    #[error("generation provider not configured")]
    ProviderNotConfigured,

    /// The provider answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    ApiRequest { status: u16, body: String },

    /// A streamed payload could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The event stream broke mid-response.
    #[error("stream error: {0}")]
    Stream(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GenerationError {
    /// Whether the provider is unreachable as a whole rather than failing
    /// this one request.
    pub fn is_outage(&self) -> bool {
        match self {
            Self::ProviderNotConfigured => true,
            Self::ApiRequest { status, .. } => *status >= 500,
            Self::Http(err) => err.is_connect() || err.is_timeout(),
            Self::InvalidResponse(_) | Self::Stream(_) => false,
        }
    }
}
