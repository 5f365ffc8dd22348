use std::sync::Arc;

use chauffeur_core::model::{OptionId, QuestionId, User};
use chauffeur_core::training::{PlaybackDecision, PlaybackEvent, TrainingPlan, TrainingProgress};
use storage::repository::CompletionRepository;

use crate::backend::TrainingBackend;
use crate::error::TrainingError;
use crate::session_store::SessionStore;

use super::state::{ActiveVideo, FetchStage, FinalizeStatus, SubmissionOutcome, TrainingState};

/// Drives one trainee through the live videos in training order.
///
/// Every (re)load fetches the full list before any detail, subtracts the
/// stored completion set and shows the first remaining video. Passing a quiz
/// persists the video ID before the next load.
pub struct TrainingFlow {
    backend: Arc<dyn TrainingBackend>,
    completions: Arc<dyn CompletionRepository>,
    session: SessionStore,
    state: TrainingState,
    plan: Option<TrainingPlan>,
    active: Option<ActiveVideo>,
}

impl TrainingFlow {
    #[must_use]
    pub fn new(
        backend: Arc<dyn TrainingBackend>,
        completions: Arc<dyn CompletionRepository>,
        session: SessionStore,
    ) -> Self {
        Self {
            backend,
            completions,
            session,
            state: TrainingState::LoadingList,
            plan: None,
            active: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    #[must_use]
    pub fn active(&self) -> Option<&ActiveVideo> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn plan(&self) -> Option<&TrainingPlan> {
        self.plan.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> Option<TrainingProgress> {
        self.plan.as_ref().map(TrainingPlan::progress)
    }

    fn transition(&mut self, next: TrainingState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "training state");
        }
        self.state = next;
    }

    fn trainee(&self) -> Result<User, TrainingError> {
        self.session.user().ok_or(TrainingError::NotSignedIn)
    }

    /// Enter the flow.
    ///
    /// # Errors
    ///
    /// See [`TrainingFlow::load`].
    pub async fn start(&mut self) -> Result<&TrainingState, TrainingError> {
        self.load().await
    }

    /// Rebuild the plan from the backend and local completions.
    ///
    /// Fetch failures move the flow to `TrainingState::Error` and leave the
    /// completion set untouched.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::NotSignedIn` without a session user, and the
    /// fetch error otherwise.
    pub async fn load(&mut self) -> Result<&TrainingState, TrainingError> {
        let user = self.trainee()?;
        self.active = None;

        if user.is_exam_completed {
            // the backend flag wins over whatever is stored locally
            self.transition(TrainingState::AllComplete(FinalizeStatus::Synced));
            return Ok(&self.state);
        }

        self.transition(TrainingState::LoadingList);
        let live = match self.backend.list_videos().await {
            Ok(live) => live,
            Err(err) => return Err(self.fail(FetchStage::List, err.into())),
        };
        let completed = match self.completions.get_completions(user.id).await {
            Ok(completed) => completed,
            Err(err) => return Err(self.fail(FetchStage::Completions, err.into())),
        };

        let plan = TrainingPlan::new(&live, &completed);
        let next = plan.next();
        let no_videos = plan.has_no_videos();
        tracing::debug!(
            user_id = %user.id,
            total = plan.ordered().len(),
            remaining = plan.remaining().len(),
            "training plan rebuilt"
        );
        self.plan = Some(plan);

        match next {
            _ if no_videos => {
                self.transition(TrainingState::NoVideos);
                Ok(&self.state)
            }
            None => self.finalize().await,
            Some(id) => {
                let mut video = match self.backend.video_detail(id).await {
                    Ok(video) => video,
                    Err(err) => return Err(self.fail(FetchStage::Detail(id), err.into())),
                };
                if let Err(err) = video.fix_media_url() {
                    tracing::warn!(video_id = %id, error = %err, "video url left as served");
                }
                self.active = Some(ActiveVideo::new(video));
                self.transition(TrainingState::ShowingVideo(id));
                Ok(&self.state)
            }
        }
    }

    fn fail(&mut self, stage: FetchStage, err: TrainingError) -> TrainingError {
        tracing::warn!(?stage, error = %err, "training fetch failed");
        self.transition(TrainingState::Error {
            stage,
            message: err.to_string(),
        });
        err
    }

    /// Retry after a fetch error.
    ///
    /// # Errors
    ///
    /// See [`TrainingFlow::load`].
    pub async fn retry(&mut self) -> Result<&TrainingState, TrainingError> {
        self.load().await
    }

    /// Report completion to the backend and refresh the session user.
    ///
    /// Completion is shown regardless; a failure only marks it as pending.
    async fn finalize(&mut self) -> Result<&TrainingState, TrainingError> {
        let status = match self.sync_completion().await {
            Ok(()) => FinalizeStatus::Synced,
            Err(reason) => {
                tracing::warn!(
                    %reason,
                    "training finished but exam status was not recorded; requires administrative follow-up"
                );
                FinalizeStatus::PendingSync { reason }
            }
        };
        self.transition(TrainingState::AllComplete(status));
        Ok(&self.state)
    }

    async fn sync_completion(&self) -> Result<(), String> {
        self.backend
            .mark_exam_completed()
            .await
            .map_err(|err| format!("exam status update failed: {err}"))?;
        let user = self
            .backend
            .current_user()
            .await
            .map_err(|err| format!("user re-fetch failed: {err}"))?;
        let confirmed = user.is_exam_completed;
        self.session
            .update_user(user)
            .await
            .map_err(|err| format!("session update failed: {err}"))?;
        if confirmed {
            tracing::info!("exam completion recorded");
            Ok(())
        } else {
            Err("backend did not confirm exam completion".to_owned())
        }
    }

    /// Retry the exam-status update after a pending sync.
    ///
    /// Does nothing unless completion is pending.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::NotSignedIn` without a session user.
    pub async fn retry_finalize(&mut self) -> Result<&TrainingState, TrainingError> {
        self.trainee()?;
        if self.state.is_pending_sync() {
            return self.finalize().await;
        }
        Ok(&self.state)
    }

    /// Feed a player event through the watch lockout.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::NoActiveVideo` when no video is showing.
    pub fn playback(&mut self, event: PlaybackEvent) -> Result<PlaybackDecision, TrainingError> {
        let active = self.active.as_mut().ok_or(TrainingError::NoActiveVideo)?;
        let decision = active.lockout_mut().handle(event);
        if let PlaybackDecision::SnapBack { position } = decision {
            tracing::debug!(video_id = %active.id(), position, "seek ahead rejected");
        }
        Ok(decision)
    }

    fn unlocked_active(&mut self) -> Result<&mut ActiveVideo, TrainingError> {
        let active = self.active.as_mut().ok_or(TrainingError::NoActiveVideo)?;
        if !active.lockout().quiz_unlocked() {
            return Err(TrainingError::QuizLocked);
        }
        Ok(active)
    }

    /// Select an answer for one question of the active quiz.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::QuizLocked` before the video has ended and
    /// `TrainingError::Answer` for options outside the quiz.
    pub fn select_answer(
        &mut self,
        question: QuestionId,
        option: OptionId,
    ) -> Result<(), TrainingError> {
        self.unlocked_active()?
            .answers_mut()
            .select(question, option)?;
        Ok(())
    }

    /// Submit the quiz of the active video.
    ///
    /// An incomplete answer sheet is rejected before any request. On a pass
    /// the video is persisted as completed and the flow reloads.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::Answer` for unanswered questions, and
    /// `TrainingError::Api`/`TrainingError::Storage` if the submission or the
    /// completion record fails. The active video stays in place on error.
    pub async fn submit(&mut self) -> Result<SubmissionOutcome, TrainingError> {
        let user = self.trainee()?;
        let active = self.unlocked_active()?;
        let submission = active.answers().to_submission()?;
        let id = active.id();

        self.transition(TrainingState::Submitting(id));
        let result = match self.backend.submit_assessment(id, &submission).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(video_id = %id, error = %err, "assessment submission failed");
                self.transition(TrainingState::ShowingVideo(id));
                return Err(err.into());
            }
        };

        if !result.passed {
            tracing::info!(video_id = %id, score = result.score, "assessment failed");
            if let Some(active) = self.active.as_mut() {
                active.record_result(result);
            }
            self.transition(TrainingState::ShowingVideo(id));
            return Ok(SubmissionOutcome::Failed {
                score: result.score,
            });
        }

        if let Err(err) = self.record_completion(&user, id).await {
            self.transition(TrainingState::ShowingVideo(id));
            return Err(err);
        }
        tracing::info!(video_id = %id, score = result.score, "assessment passed");

        // a failed reload is reported through the state; the pass stands
        if let Err(err) = self.load().await {
            tracing::warn!(error = %err, "reload after pass failed");
        }
        Ok(SubmissionOutcome::Passed {
            score: result.score,
        })
    }

    async fn record_completion(
        &self,
        user: &User,
        id: chauffeur_core::model::VideoId,
    ) -> Result<(), TrainingError> {
        let mut completed = self.completions.get_completions(user.id).await?;
        completed.insert(id);
        self.completions.put_completions(user.id, &completed).await?;
        Ok(())
    }
}
