use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::Validation,
            429 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Error body as the backend writes it: `error` is the headline, `mensaje`
/// and `detalle` are optional elaborations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "mensaje")]
    pub message: Option<String>,
    #[serde(default, rename = "detalle")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    /// Builds an error from a non-2xx status and whatever body came with it.
    /// Bodies that are not the usual JSON shape fall back to the raw text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let code = ErrorCode::from_status(status);
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed.headline(),
            Err(_) => None,
        }
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.to_string()
            }
        });
        Self { code, message }
    }
}

impl ErrorBody {
    fn headline(self) -> Option<String> {
        match (self.error, self.message.or(self.detail)) {
            (Some(error), Some(extra)) if extra != error => Some(format!("{error}: {extra}")),
            (Some(error), _) => Some(error),
            (None, Some(extra)) => Some(extra),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combines_error_and_detail_from_backend_body() {
        let err = ApiError::from_response(
            500,
            r#"{"error":"Error obteniendo fuentes","detalle":"db down"}"#,
        );
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "Error obteniendo fuentes: db down");
    }

    #[test]
    fn falls_back_to_raw_text_for_non_json_bodies() {
        let err = ApiError::from_response(502, "<html>bad gateway</html>");
        assert_eq!(err.message, "<html>bad gateway</html>");

        let empty = ApiError::from_response(404, "");
        assert_eq!(empty.code, ErrorCode::NotFound);
        assert_eq!(empty.message, "HTTP 404");
    }

    #[test]
    fn token_errors_map_to_unauthorized() {
        let err = ApiError::from_response(
            401,
            r#"{"error":"Token expirado","mensaje":"El token JWT ha expirado."}"#,
        );
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert!(err.message.starts_with("Token expirado"));
    }
}
