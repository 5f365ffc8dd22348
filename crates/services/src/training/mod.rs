mod flow;
mod state;

// Public API of the training subsystem.
pub use crate::error::TrainingError;
pub use flow::TrainingFlow;
pub use state::{ActiveVideo, FetchStage, FinalizeStatus, SubmissionOutcome, TrainingState};
