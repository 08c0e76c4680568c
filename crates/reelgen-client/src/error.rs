//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Client configuration error: {0}")]
    Config(String),

    /// Connection, DNS, TLS or timeout failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Well-formed response carrying an error code in its body
    #[error("Service error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Worth retrying: transport failures, throttling and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Http { status, .. } => is_transient_status(i64::from(*status)),
            ClientError::Api { code, .. } => is_transient_status(*code),
            _ => false,
        }
    }
}

fn is_transient_status(code: i64) -> bool {
    code == 429 || (500..600).contains(&code)
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ClientError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None if e.is_decode() => ClientError::InvalidResponse(e.to_string()),
            None => ClientError::Transport(e.to_string()),
        }
    }
}
