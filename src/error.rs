// Application error taxonomy and its mapping onto HTTP responses.
//
// The rules: a 401 from the backend always becomes a redirect to the login
// route, never an inline error; a 403 stays inline; validation failures are
// caught before any request leaves the process; everything else degrades the
// affected section and is logged in full server-side only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::api_client::ApiError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication is missing or rejected; carries the login URL to
    /// redirect to.
    #[error("authentication required")]
    AuthRedirect(String),

    #[error("{0}")]
    Forbidden(String),

    /// Client-side validation failure. Never reaches the network.
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps a backend API error into the response taxonomy. `login_url` is
    /// where a 401 should send the browser.
    pub fn from_api(err: ApiError, login_url: &str) -> Self {
        match err {
            ApiError::Unauthorized => AppError::AuthRedirect(login_url.to_string()),
            ApiError::Forbidden => {
                AppError::Forbidden("You are not allowed to perform this action.".to_string())
            }
            ApiError::NotFound => AppError::NotFound,
            ApiError::Validation(msg) => AppError::Validation(msg),
            ApiError::Status { status, message } => AppError::Internal(anyhow::anyhow!(
                "backend returned {}: {}",
                status,
                message
            )),
            ApiError::Transport(e) => {
                AppError::Internal(anyhow::Error::new(e).context("backend request failed"))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::AuthRedirect(login_url) => {
                tracing::info!("Unauthenticated request, redirecting to {}", login_url);
                Redirect::to(&login_url).into_response()
            }
            AppError::Forbidden(message) => {
                tracing::warn!("Forbidden: {}", message);
                (StatusCode::FORBIDDEN, message).into_response()
            }
            AppError::Validation(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, message).into_response()
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()).into_response(),
            AppError::Internal(e) => {
                // Log the detailed error; don't expose internals to the client.
                tracing::error!("Internal server error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
                    .into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_401_becomes_a_login_redirect() {
        let err = AppError::from_api(ApiError::Unauthorized, "/login");
        match err {
            AppError::AuthRedirect(url) => assert_eq!(url, "/login"),
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[test]
    fn backend_403_stays_inline() {
        let err = AppError::from_api(ApiError::Forbidden, "/login");
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn local_validation_is_preserved() {
        let err = AppError::from_api(ApiError::Validation("too short".into()), "/login");
        match err {
            AppError::Validation(msg) => assert_eq!(msg, "too short"),
            other => panic!("expected validation, got {:?}", other),
        }
    }
}
