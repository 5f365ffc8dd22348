//! Shared error types for the services crate.

use reqwest::StatusCode;
use thiserror::Error;

use chauffeur_core::model::AnswerError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ApiClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("request body could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("request failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("request was rejected after refreshing the access token")]
    Unauthorized,
    #[error("not signed in")]
    NotSignedIn,
    #[error("session expired, sign in again at {login_route}")]
    SessionExpired { login_route: &'static str },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Status code of a rejected request, if the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired { .. })
    }
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] chauffeur_core::Error),
    #[error("this account cannot sign in to the admin portal")]
    NotAdmin,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the training flow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrainingError {
    #[error("sign in to continue training")]
    NotSignedIn,
    #[error("no training video is active")]
    NoActiveVideo,
    #[error("watch the whole video before answering the quiz")]
    QuizLocked,
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the admin CRUD services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdminError {
    #[error("an admin account is required")]
    Forbidden,
    #[error(transparent)]
    Validation(#[from] chauffeur_core::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
