use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Structured API error returned to REST clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

/// Application-level error taxonomy.
///
/// Every failed operation ends up here, whether it came in over REST or the
/// gateway. REST callers get an HTTP response via [`IntoResponse`]; gateway
/// callers get an `error` event on the originating connection only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    Unauthorized(String),
    NotFound(String),
    Forbidden(String),
    Conflict(String),
    Validation(String),
    Persistence(String),
    Internal(String),
}

impl RelayError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The message safe to show to a client. Storage and internal failures
    /// carry detail for logs only; clients get a generic message.
    pub fn client_message(&self) -> &str {
        match self {
            Self::Unauthorized(m)
            | Self::NotFound(m)
            | Self::Forbidden(m)
            | Self::Conflict(m)
            | Self::Validation(m) => m,
            Self::Persistence(_) | Self::Internal(_) => "An internal error occurred",
        }
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized(m)
            | Self::NotFound(m)
            | Self::Forbidden(m)
            | Self::Conflict(m)
            | Self::Validation(m)
            | Self::Persistence(m)
            | Self::Internal(m) => write!(f, "{}: {}", self.code(), m),
        }
    }
}

impl std::error::Error for RelayError {}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Persistence(_) | Self::Internal(_)) {
            tracing::error!(error = %self, "request failed");
        }
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code().to_string(),
                message: self.client_message().to_string(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<diesel::result::Error> for RelayError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match err {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                Self::conflict("Already exists")
            }
            other => {
                tracing::error!(?other, "database error");
                Self::persistence("database error")
            }
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for RelayError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        tracing::error!(?err, "pool error");
        Self::persistence("connection pool error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_detail_is_not_shown_to_clients() {
        let err = RelayError::persistence("connection refused on 10.0.0.3");
        assert_eq!(err.client_message(), "An internal error occurred");
        assert_eq!(err.code(), "PERSISTENCE_FAILURE");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = RelayError::forbidden("Only group admins can add members");
        assert_eq!(err.client_message(), "Only group admins can add members");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unique_violations_map_to_conflict() {
        let err: RelayError = diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_string()),
        )
        .into();
        assert!(matches!(err, RelayError::Conflict(_)));
    }
}
