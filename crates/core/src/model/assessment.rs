use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};
use crate::model::video::Question;

/// Pass mark shown to trainees. Scoring itself happens on the backend.
pub const PASS_THRESHOLD_PERCENT: u8 = 80;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),

    #[error("option {option} does not belong to question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("{missing} of {total} questions are unanswered")]
    Unanswered { missing: usize, total: usize },
}

/// One selected option per question of the active video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSheet {
    // question -> options offered, in display order
    questions: Vec<(QuestionId, Vec<OptionId>)>,
    selected: BTreeMap<QuestionId, OptionId>,
}

impl AnswerSheet {
    #[must_use]
    pub fn new<'a>(questions: impl IntoIterator<Item = &'a Question>) -> Self {
        Self {
            questions: questions
                .into_iter()
                .map(|q| (q.id, q.options.iter().map(|o| o.id).collect()))
                .collect(),
            selected: BTreeMap::new(),
        }
    }

    /// Select an option, replacing any earlier choice for that question.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` if the question or option is not part of the quiz.
    pub fn select(&mut self, question: QuestionId, option: OptionId) -> Result<(), AnswerError> {
        let (_, options) = self
            .questions
            .iter()
            .find(|(id, _)| *id == question)
            .ok_or(AnswerError::UnknownQuestion(question))?;
        if !options.contains(&option) {
            return Err(AnswerError::UnknownOption { question, option });
        }
        self.selected.insert(question, option);
        Ok(())
    }

    #[must_use]
    pub fn selected(&self, question: QuestionId) -> Option<OptionId> {
        self.selected.get(&question).copied()
    }

    /// Questions without a selection, in display order.
    #[must_use]
    pub fn missing(&self) -> Vec<QuestionId> {
        self.questions
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !self.selected.contains_key(id))
            .collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Build the request body. Fails locally when any question is unanswered.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::Unanswered` if a question has no selection.
    pub fn to_submission(&self) -> Result<Submission, AnswerError> {
        let missing = self.missing().len();
        if missing > 0 {
            return Err(AnswerError::Unanswered {
                missing,
                total: self.total(),
            });
        }
        let answers = self
            .questions
            .iter()
            .filter_map(|(question_id, _)| {
                self.selected.get(question_id).map(|option_id| SubmittedAnswer {
                    question_id: *question_id,
                    option_id: *option_id,
                })
            })
            .collect();
        Ok(Submission { answers })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub option_id: OptionId,
}

/// Backend verdict for one quiz attempt. `score` is a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub score: f64,
    pub passed: bool,
}
