//! Error codes and exit status for techcarectl

use reqwest::StatusCode;
use techcare_shared::api::ApiErrorBody;
use thiserror::Error;

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code when the daemon returns a body we cannot decode
pub const EXIT_INVALID_RESPONSE: i32 = 65;

/// Exit code when not logged in or not allowed
pub const EXIT_UNAUTHORIZED: i32 = 69;

/// Exit code when the daemon is unreachable
pub const EXIT_DAEMON_UNAVAILABLE: i32 = 70;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Cannot reach techcared at {url}: {reason}\nIs the daemon running? Try: systemctl status techcared")]
    Unavailable { url: String, reason: String },

    #[error("Not logged in. Run: techcarectl login <user>")]
    NotLoggedIn,

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Invalid response from daemon: {0}")]
    InvalidResponse(String),

    #[error("{message} ({code})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl CliError {
    /// Map a non-2xx response to an error
    pub fn from_response(status: StatusCode, body: Option<ApiErrorBody>) -> Self {
        let (code, message) = match body {
            Some(b) => (b.code, b.message),
            None => (
                "http".to_string(),
                format!("request failed with status {}", status),
            ),
        };
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CliError::Unauthorized { message },
            _ => CliError::Api {
                status: status.as_u16(),
                code,
                message,
            },
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Unavailable { .. } => EXIT_DAEMON_UNAVAILABLE,
            CliError::NotLoggedIn | CliError::Unauthorized { .. } => EXIT_UNAUTHORIZED,
            CliError::InvalidResponse(_) => EXIT_INVALID_RESPONSE,
            CliError::Api { .. } => EXIT_GENERAL_ERROR,
        }
    }
}

/// Exit code for any error surfaced by a command
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<CliError>())
        .map(CliError::exit_code)
        .unwrap_or(EXIT_GENERAL_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = CliError::from_response(StatusCode::FORBIDDEN, None);
        assert_eq!(err.exit_code(), EXIT_UNAUTHORIZED);

        let err = CliError::from_response(
            StatusCode::NOT_FOUND,
            Some(ApiErrorBody {
                code: "not_found".into(),
                message: "Not found: diagnostic x".into(),
            }),
        );
        assert_eq!(err.exit_code(), EXIT_GENERAL_ERROR);
        assert_eq!(err.to_string(), "Not found: diagnostic x (not_found)");
    }

    #[test]
    fn test_exit_code_through_context() {
        let err = anyhow::Error::new(CliError::InvalidResponse("eof".into())).context("diagnose");
        assert_eq!(exit_code_for(&err), EXIT_INVALID_RESPONSE);
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), EXIT_GENERAL_ERROR);
    }
}
