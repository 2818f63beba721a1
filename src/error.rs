//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the session store,
//! the registration flow and the verification sub-flow, along with helpers
//! to derive the short user-facing message each error class carries.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Local, synchronous form validation failure. Recoverable: the user may
    /// correct the input and resubmit immediately.
    Validation { code: String, message: String },
    /// Login/registration failed inside the session store (persistence write
    /// path). Surfaced as a generic message, never with partial state.
    Auth { code: String, message: String },
    /// The external document verifier rejected a document or returned an
    /// unusable response.
    Verification { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Verification { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Verification { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn verification<S: Into<String>>(code: S, msg: S) -> Self { AppError::Verification { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Whether the user can recover by simply correcting input and retrying,
    /// without any external system having been contacted.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(self, AppError::Validation { .. } | AppError::Verification { .. })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability_mapping() {
        assert!(AppError::validation("missing_fields", "fill in all fields").is_user_recoverable());
        assert!(AppError::verification("rejected", "blurry image").is_user_recoverable());
        assert!(!AppError::auth("auth_failed", "try again").is_user_recoverable());
        assert!(!AppError::io("write_failed", "disk").is_user_recoverable());
        assert!(!AppError::internal("bug", "oops").is_user_recoverable());
    }

    #[test]
    fn display_includes_code_and_message() {
        let e = AppError::validation("passwords_mismatch", "Passwords do not match");
        assert_eq!(e.to_string(), "passwords_mismatch: Passwords do not match");
        assert_eq!(e.code_str(), "passwords_mismatch");
        assert_eq!(e.message(), "Passwords do not match");
    }
}
