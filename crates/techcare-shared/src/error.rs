//! Error types for TechCare.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TechcareError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Collector error: {0}")]
    Collector(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TechcareError {
    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            TechcareError::NotFound(_) => "not_found",
            TechcareError::Validation(_) => "validation",
            TechcareError::InvalidState(_) => "invalid_state",
            TechcareError::Unauthenticated => "unauthenticated",
            TechcareError::InvalidCredentials => "invalid_credentials",
            TechcareError::Forbidden(_) => "forbidden",
            TechcareError::Conflict(_) => "conflict",
            TechcareError::Collector(_) => "collector",
            TechcareError::Storage(_) => "storage",
            TechcareError::Io(_) => "io",
            TechcareError::Json(_) => "json",
            TechcareError::Internal(_) => "internal",
        }
    }

    /// HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            TechcareError::NotFound(_) => 404,
            TechcareError::Validation(_) | TechcareError::Json(_) => 400,
            TechcareError::InvalidState(_) | TechcareError::Conflict(_) => 409,
            TechcareError::Unauthenticated | TechcareError::InvalidCredentials => 401,
            TechcareError::Forbidden(_) => 403,
            TechcareError::Collector(_)
            | TechcareError::Storage(_)
            | TechcareError::Io(_)
            | TechcareError::Internal(_) => 500,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        TechcareError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        TechcareError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TechcareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(TechcareError::not_found("plan").http_status(), 404);
        assert_eq!(TechcareError::validation("bad").http_status(), 400);
        assert_eq!(TechcareError::Unauthenticated.http_status(), 401);
        assert_eq!(TechcareError::Forbidden("x".into()).http_status(), 403);
        assert_eq!(TechcareError::Conflict("x".into()).http_status(), 409);
    }

    #[test]
    fn test_display_includes_detail() {
        let err = TechcareError::not_found("diagnostic abc");
        assert_eq!(err.to_string(), "Not found: diagnostic abc");
        assert_eq!(err.code(), "not_found");
    }
}
