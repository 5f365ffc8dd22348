use chauffeur_core::model::{AnswerSheet, AssessmentResult, Video, VideoId};
use chauffeur_core::training::WatchLockout;

/// Which fetch a training error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    List,
    Completions,
    Detail(VideoId),
}

/// Whether the backend has acknowledged that training is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeStatus {
    Synced,
    /// Shown as complete locally; the exam-status update has not gone through.
    PendingSync { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingState {
    LoadingList,
    ShowingVideo(VideoId),
    Submitting(VideoId),
    /// There are no live videos; training is never finalized in this state.
    NoVideos,
    AllComplete(FinalizeStatus),
    Error { stage: FetchStage, message: String },
}

impl TrainingState {
    #[must_use]
    pub fn active_video(&self) -> Option<VideoId> {
        match self {
            TrainingState::ShowingVideo(id) | TrainingState::Submitting(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, TrainingState::AllComplete(_))
    }

    #[must_use]
    pub fn is_pending_sync(&self) -> bool {
        matches!(
            self,
            TrainingState::AllComplete(FinalizeStatus::PendingSync { .. })
        )
    }
}

/// The video being watched together with its lockout and quiz answers.
#[derive(Debug, Clone)]
pub struct ActiveVideo {
    video: Video,
    lockout: WatchLockout,
    answers: AnswerSheet,
    last_result: Option<AssessmentResult>,
}

impl ActiveVideo {
    pub(crate) fn new(video: Video) -> Self {
        let answers = AnswerSheet::new(video.ordered_questions());
        Self {
            video,
            lockout: WatchLockout::new(),
            answers,
            last_result: None,
        }
    }

    #[must_use]
    pub fn video(&self) -> &Video {
        &self.video
    }

    #[must_use]
    pub fn id(&self) -> VideoId {
        self.video.id
    }

    #[must_use]
    pub fn lockout(&self) -> &WatchLockout {
        &self.lockout
    }

    pub(crate) fn lockout_mut(&mut self) -> &mut WatchLockout {
        &mut self.lockout
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    pub(crate) fn answers_mut(&mut self) -> &mut AnswerSheet {
        &mut self.answers
    }

    /// Result of the most recent failed attempt on this video.
    #[must_use]
    pub fn last_result(&self) -> Option<AssessmentResult> {
        self.last_result
    }

    pub(crate) fn record_result(&mut self, result: AssessmentResult) {
        self.last_result = Some(result);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubmissionOutcome {
    /// The video was added to the completion set; see the flow state for
    /// what comes next.
    Passed { score: f64 },
    /// Below the pass mark; the same video stays active for another attempt.
    Failed { score: f64 },
}
