//! Failures surfaced by the REST client and by page sources.

use shared::error::ErrorCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Transport failure: backend unreachable, connection reset, timeout.
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx response, or a 2xx body with `"success": false`.
    #[error("server error ({status}): {message}")]
    Server {
        status: u16,
        code: ErrorCode,
        message: String,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("not signed in")]
    NotAuthenticated,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            code: ErrorCode::from_status(status),
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        match self {
            Self::NotAuthenticated => true,
            Self::Server { code, .. } => {
                matches!(code, ErrorCode::Unauthorized | ErrorCode::Forbidden)
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::server(status.as_u16(), err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidInput(format!("invalid url: {err}"))
    }
}
