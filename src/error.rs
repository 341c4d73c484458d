use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Where unauthenticated clients are told to go.
pub const SIGNIN_REDIRECT: &str = "/signin.html";

/// Externally visible error taxonomy. Every handler failure maps to one of
/// these; infrastructure detail stays in the log, never in the body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<&'static str>,
    },
    #[error("{message}")]
    Conflict {
        message: String,
        field: &'static str,
    },
    /// Deliberately generic: unknown email and wrong password must be
    /// indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is temporarily locked due to too many failed login attempts. Please try again later.")]
    AccountLocked,
    #[error("Access denied. No token provided.")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("Too many authentication attempts. Please try again later.")]
    RateLimited,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: &'static str) -> Self {
        ApiError::Validation {
            message: message.into(),
            field: Some(field),
        }
    }

    pub fn conflict(field: &'static str) -> Self {
        let message = match field {
            "email" => "Email already exists",
            _ => "Username already exists",
        };
        ApiError::Conflict {
            message: message.into(),
            field,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::InvalidCredentials => StatusCode::BAD_REQUEST,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::AccountLocked => StatusCode::LOCKED,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Translates a unique-index violation into the matching `Conflict`, naming
/// the field that collided. Backstop for the register/profile races the
/// pre-checks cannot close.
pub fn db_conflict(err: &sqlx::Error) -> Option<ApiError> {
    let db = err.as_database_error()?;
    match db.constraint()? {
        "users_email_key" => Some(ApiError::conflict("email")),
        "users_username_key" => Some(ApiError::conflict("username")),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, field, redirect) = match &self {
            ApiError::Validation { message, field } => (message.clone(), *field, None),
            ApiError::Conflict { message, field } => (message.clone(), Some(*field), None),
            ApiError::Unauthenticated | ApiError::Forbidden(_) => {
                (self.to_string(), None, Some(SIGNIN_REDIRECT))
            }
            ApiError::Internal(source) => {
                error!(error = %source, "internal server error");
                ("Something went wrong. Please try again.".into(), None, None)
            }
            _ => (self.to_string(), None, None),
        };
        (
            status,
            Json(ErrorBody {
                message,
                field,
                redirect,
            }),
        )
            .into_response()
    }
}
