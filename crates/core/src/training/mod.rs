//! Trainee-side progression through the Code of Conduct videos.
//!
//! Everything here is pure: the services layer feeds it the live video list,
//! the stored completion set and player events.

mod completion;
mod lockout;
mod plan;

pub use completion::CompletionSet;
pub use lockout::{PlaybackDecision, PlaybackEvent, SEEK_TOLERANCE_SECS, WatchLockout};
pub use plan::{TrainingPlan, TrainingProgress, sort_videos};
