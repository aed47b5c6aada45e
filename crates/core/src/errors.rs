/// Result type alias for cachemesh core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cachemesh value parsing and validation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An endpoint string could not be parsed
    #[error("invalid endpoint '{value}': {message}")]
    InvalidEndpoint { value: String, message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create an invalid endpoint error
    #[must_use]
    pub fn invalid_endpoint(value: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidEndpoint {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}
