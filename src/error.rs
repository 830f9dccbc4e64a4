/// Application Error Handling
///
/// Every failure in the service is raised where it is detected and carried
/// upward as an `AppError`. The conversion into an HTTP response happens once,
/// in the `ResponseError` implementation below.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Rejected request input
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(String),
    TooLong(String, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is required", field),
            ValidationError::TooLong(field, max) => {
                write!(f, "{} must be at most {} characters", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} is malformed", field),
        }
    }
}

impl StdError for ValidationError {}

#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(what) => write!(f, "already exists: {}", what),
            DatabaseError::NotFound(what) => write!(f, "not found: {}", what),
            DatabaseError::ConnectionPool(cause) => write!(f, "database unavailable: {}", cause),
            DatabaseError::UnexpectedError(cause) => write!(f, "database failure: {}", cause),
        }
    }
}

impl StdError for DatabaseError {}

/// Startup configuration problems
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(key) => write!(f, "{} must be set", key),
            ConfigError::InvalidValue(reason) => write!(f, "{}", reason),
        }
    }
}

impl StdError for ConfigError {}

/// Why a login, access check or refresh was refused
///
/// The display strings are for logs only. Clients always receive the same
/// generic 401 body so a caller cannot tell which check rejected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong password for an existing identity
    InvalidCredentials,
    /// No access token in cookie or Authorization header
    MissingAccessToken,
    /// No refresh token in cookie or request body
    MissingRefreshToken,
    /// Malformed, mis-signed, wrong issuer or expired token
    TokenInvalid,
    /// Token verified but its subject does not resolve to an identity
    UnknownSubject,
    /// Refresh token no longer matches the stored session (rotated, revoked or raced)
    TokenReused,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            AuthError::InvalidCredentials => "invalid credentials",
            AuthError::MissingAccessToken => "missing access token",
            AuthError::MissingRefreshToken => "missing refresh token",
            AuthError::TokenInvalid => "invalid or expired refresh token",
            AuthError::UnknownSubject => "invalid refresh token",
            AuthError::TokenReused => "refresh token expired or already used",
        };
        f.write_str(reason)
    }
}

impl StdError for AuthError {}

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    /// A signing operation failed while minting tokens
    Issuance(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => fmt::Display::fmt(e, f),
            AppError::Database(e) => fmt::Display::fmt(e, f),
            AppError::Auth(e) => fmt::Display::fmt(e, f),
            AppError::Issuance(cause) => write!(f, "token issuance failed: {}", cause),
            AppError::Internal(cause) => write!(f, "internal failure: {}", cause),
        }
    }
}

impl StdError for AppError {}

impl AppError {
    /// The authentication cause, if this is an authentication failure
    pub fn auth_kind(&self) -> Option<&AuthError> {
        match self {
            AppError::Auth(e) => Some(e),
            _ => None,
        }
    }

    /// Status, machine code and client-facing message
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Database(e @ DatabaseError::UniqueConstraintViolation(_)) => {
                (StatusCode::CONFLICT, "DUPLICATE_ENTRY", e.to_string())
            }
            AppError::Database(e @ DatabaseError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
            }
            AppError::Database(DatabaseError::ConnectionPool(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Database service temporarily unavailable".to_string(),
            ),
            AppError::Database(DatabaseError::UnexpectedError(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database error occurred".to_string(),
            ),
            // Same body for every cause
            AppError::Auth(_) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized request".to_string(),
            ),
            AppError::Issuance(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TOKEN_ISSUANCE_ERROR",
                "Something went wrong while generating tokens".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(_) | AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(error_id, error = %self, "Request rejected");
            }
            AppError::Database(DatabaseError::NotFound(_)) => {
                tracing::info!(error_id, error = %self, "Record not found");
            }
            AppError::Auth(cause) => {
                tracing::warn!(error_id, cause = %cause, "Authentication refused");
            }
            _ => {
                tracing::error!(error_id, error = %self, "Request failed");
            }
        }
    }

    /// Body sent to the client for this error
    pub fn to_response_body(&self, error_id: &str) -> ErrorResponse {
        let (status, code, message) = self.classify();
        ErrorResponse {
            error_id: error_id.to_string(),
            message,
            code: code.to_string(),
            status: status.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let mapped = match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("record".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                DatabaseError::UniqueConstraintViolation(
                    "username or email already registered".to_string(),
                )
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            _ => DatabaseError::UnexpectedError(err.to_string()),
        };
        AppError::Database(mapped)
    }
}

/// JSON error body: `{error_id, message, code, status, timestamp}`
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Correlates the response with the server log line
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        HttpResponse::build(self.status_code()).json(self.to_response_body(&error_id))
    }

    fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

/// Per-request identifiers attached to handler log lines
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: &'static str,
}

impl RequestContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation,
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(AuthError::MissingRefreshToken.to_string(), "missing refresh token");
        assert_eq!(
            AuthError::TokenInvalid.to_string(),
            "invalid or expired refresh token"
        );
        assert_eq!(AuthError::UnknownSubject.to_string(), "invalid refresh token");
        assert_eq!(
            AuthError::TokenReused.to_string(),
            "refresh token expired or already used"
        );
    }

    #[test]
    fn test_all_auth_errors_share_one_response() {
        let causes = [
            AuthError::InvalidCredentials,
            AuthError::MissingAccessToken,
            AuthError::MissingRefreshToken,
            AuthError::TokenInvalid,
            AuthError::UnknownSubject,
            AuthError::TokenReused,
        ];

        for cause in causes {
            let err = AppError::Auth(cause);
            let body = err.to_response_body("req-1");
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert_eq!(body.status, 401);
            assert_eq!(body.code, "UNAUTHORIZED");
            assert_eq!(body.message, "Unauthorized request");
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation(ValidationError::EmptyField("password".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Database(DatabaseError::NotFound("user".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(DatabaseError::UniqueConstraintViolation("user".into()))
                .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database(DatabaseError::ConnectionPool("timeout".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Issuance("bad key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_issuance_error_does_not_leak_detail() {
        let err = AppError::Issuance("access signing key is empty".into());
        let body = err.to_response_body("req-2");
        assert!(!body.message.contains("signing key"));
        assert_eq!(body.code, "TOKEN_ISSUANCE_ERROR");
        assert_eq!(body.error_id, "req-2");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(DatabaseError::NotFound(_))));

        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::Database(DatabaseError::ConnectionPool(_))));
    }

    #[test]
    fn test_request_context() {
        let ctx = RequestContext::new("token_refresh");
        assert_eq!(ctx.operation, "token_refresh");
        assert!(ctx.user_id.is_none());

        let ctx_with_user = ctx.with_user_id("user-123".to_string());
        assert_eq!(ctx_with_user.user_id, Some("user-123".to_string()));
    }
}
