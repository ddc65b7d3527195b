//! Authentication outcome types.

use tessera_core::error::TesseraError;
use thiserror::Error;

/// Coarse classification callers use to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input; the caller can fix the request.
    Validation,
    /// Uniqueness violation.
    Conflict,
    /// Bad credentials or a missing, expired or invalid token.
    Authentication,
    /// The referenced user is gone.
    NotFound,
    /// Store or crypto failure. Detail is for logs only.
    Internal,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email and password are required")]
    MissingFields,

    #[error("password must be at least {min_length} characters")]
    PasswordTooShort { min_length: usize },

    #[error("email already exists")]
    EmailExists,

    /// Unknown email and wrong password collapse into this one outcome.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token is required")]
    TokenMissing,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("user not found")]
    UserNotFound,

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("store error: {0}")]
    Store(#[from] TesseraError),
}

impl AuthError {
    /// Stable machine-readable outcome code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingFields => "MISSING_FIELDS",
            AuthError::PasswordTooShort { .. } => "PASSWORD_TOO_SHORT",
            AuthError::EmailExists => "EMAIL_EXISTS",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::TokenMissing => "TOKEN_MISSING",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenInvalid(_) => "TOKEN_INVALID",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::Crypto(_) | AuthError::Store(_) => "INTERNAL_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingFields | AuthError::PasswordTooShort { .. } => ErrorKind::Validation,
            AuthError::EmailExists => ErrorKind::Conflict,
            AuthError::InvalidCredentials
            | AuthError::TokenMissing
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => ErrorKind::Authentication,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::Crypto(_) | AuthError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand to a caller. Internal failures are opaque.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::TokenInvalid(_) => "invalid token".into(),
            AuthError::Crypto(_) | AuthError::Store(_) => "internal server error".into(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_wire_contract() {
        assert_eq!(AuthError::MissingFields.code(), "MISSING_FIELDS");
        assert_eq!(
            AuthError::PasswordTooShort { min_length: 8 }.code(),
            "PASSWORD_TOO_SHORT"
        );
        assert_eq!(AuthError::EmailExists.code(), "EMAIL_EXISTS");
        assert_eq!(AuthError::TokenInvalid("bad".into()).code(), "TOKEN_INVALID");
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = AuthError::Store(TesseraError::Database("SELECT * FROM user failed".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(!err.public_message().contains("SELECT"));
    }

    #[test]
    fn token_errors_are_authentication_failures() {
        assert_eq!(AuthError::TokenExpired.kind(), ErrorKind::Authentication);
        assert_eq!(AuthError::TokenMissing.kind(), ErrorKind::Authentication);
        assert_eq!(AuthError::InvalidCredentials.kind(), ErrorKind::Authentication);
    }
}
