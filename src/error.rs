use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    // Local validation, never reaches the network
    #[error("{message}")]
    Validation { message: String },

    #[error("No verification in progress")]
    NoActiveTransaction,

    // Server errors
    #[error("{message}")]
    Server { message: String },

    #[error("{message}")]
    RateLimited { message: String },

    #[error("Request failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Failed to decode response: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },

    // Configuration errors
    #[error("Failed to load config file '{path}': {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },
}

impl SessionError {
    pub fn validation(message: impl Into<String>) -> Self {
        SessionError::Validation {
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        SessionError::Server {
            message: message.into(),
        }
    }

    /// Message suitable for an error toast
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Http { .. } | SessionError::Decode { .. } => {
                "Could not reach the server. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether the error was detected locally without a network round trip
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SessionError::Validation { .. } | SessionError::NoActiveTransaction
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
