use thiserror::Error;

use crate::model::{AnswerError, UserError, VideoError};

/// Validation failures raised before anything is sent to the backend.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Video(#[from] VideoError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
}
