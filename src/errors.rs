use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// A submission or patch field is missing or malformed. Detected before any write.
    Validation {
        /// Name of the offending field, as the client sent it.
        field: String,
        /// Human readable explanation.
        message: String,
    },
    /// The operation needs an identity and none was presented.
    Unauthenticated {
        /// Authentication entry point the client should send the user to.
        redirect: String,
    },
    /// Authenticated, but the caller lacks the role the operation requires.
    Forbidden(String),
    /// Resource not found error.
    NotFound(String),
    /// The backing store rejected the operation or is unreachable.
    Storage(String),
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Error interacting with an external API.
    ExternalApiError(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Strips context wrappers, returning the innermost error.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for errors a caller may retry without changing its input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            AppError::Storage(_) | AppError::DatabaseError(_)
        )
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation { field, message } => {
                write!(f, "Validation error on {}: {}", field, message)
            }
            AppError::Unauthenticated { redirect } => {
                write!(f, "Authentication required (sign in at {})", redirect)
            }
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "field": field }),
            ),
            AppError::Unauthenticated { redirect } => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Authentication required", "redirect": redirect }),
            ),
            AppError::Forbidden(msg) => {
                tracing::warn!("Forbidden access: {}", msg);
                (StatusCode::FORBIDDEN, json!({ "error": "Forbidden" }))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": "Storage unavailable, please retry" }),
                )
            }
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": "Storage unavailable, please retry" }),
                )
            }
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "External service error" }),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.clone().into_response();
            }
        };

        (status, Json(body)).into_response()
    }
}

impl Clone for AppError {
    /// Clones the error.
    ///
    /// Note: `sqlx::Error` is not cloneable, so `DatabaseError` becomes `Storage` carrying its message.
    fn clone(&self) -> Self {
        match self {
            AppError::Validation { field, message } => AppError::Validation {
                field: field.clone(),
                message: message.clone(),
            },
            AppError::Unauthenticated { redirect } => AppError::Unauthenticated {
                redirect: redirect.clone(),
            },
            AppError::Forbidden(msg) => AppError::Forbidden(msg.clone()),
            AppError::NotFound(msg) => AppError::NotFound(msg.clone()),
            AppError::Storage(msg) => AppError::Storage(msg.clone()),
            AppError::DatabaseError(e) => AppError::Storage(e.to_string()),
            AppError::ExternalApiError(msg) => AppError::ExternalApiError(msg.clone()),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    /// Converts a `sqlx::Error` into an `AppError`.
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unwraps_nested_context() {
        let err: Result<(), AppError> = Err(AppError::NotFound("quotation".to_string()));
        let err = err.context("loading").context("updating").unwrap_err();
        assert!(matches!(err.root(), AppError::NotFound(_)));
        assert_eq!(err.to_string(), "updating: loading: Not found: quotation");
    }

    #[test]
    fn only_storage_errors_are_retryable() {
        assert!(AppError::Storage("down".to_string()).is_retryable());
        assert!(AppError::DatabaseError(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!AppError::validation("email", "required").is_retryable());
        assert!(!AppError::Forbidden("admin only".to_string()).is_retryable());
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (AppError::validation("email", "required"), StatusCode::BAD_REQUEST),
            (
                AppError::Unauthenticated {
                    redirect: "/auth".to_string(),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::Forbidden("x".to_string()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (
                AppError::Storage("x".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
