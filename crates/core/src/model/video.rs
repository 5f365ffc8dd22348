use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::{OptionId, QuestionId, VideoId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum VideoError {
    #[error("video title cannot be empty")]
    EmptyTitle,

    #[error("video url is not valid: {0}")]
    InvalidUrl(String),

    #[error("video duration must be > 0 seconds, got {0}")]
    InvalidDuration(f64),

    #[error("a training video needs at least one question")]
    NoQuestions,

    #[error("question {index} text cannot be empty")]
    EmptyQuestion { index: usize },

    #[error("question {index} needs at least two options")]
    TooFewOptions { index: usize },

    #[error("question {index} must have exactly one correct option, found {found}")]
    CorrectOptionCount { index: usize, found: usize },
}

//
// ─── STORAGE PROVIDER URLS ─────────────────────────────────────────────────────
//

const IMAGE_UPLOAD_SEGMENT: &str = "/image/upload/";
const VIDEO_UPLOAD_SEGMENT: &str = "/video/upload/";

/// Returns a URL the player can stream.
///
/// The media host sometimes reports uploaded videos under its `image`
/// resource path; those are rewritten to the `video` resource path.
///
/// # Errors
///
/// Returns `VideoError::InvalidUrl` if `raw` is not an absolute URL.
pub fn playable_video_url(raw: &str) -> Result<Url, VideoError> {
    let mut url = Url::parse(raw.trim()).map_err(|err| VideoError::InvalidUrl(err.to_string()))?;
    if url.path().contains(IMAGE_UPLOAD_SEGMENT) {
        let path = url
            .path()
            .replacen(IMAGE_UPLOAD_SEGMENT, VIDEO_UPLOAD_SEGMENT, 1);
        url.set_path(&path);
    }
    Ok(url)
}

//
// ─── VIDEOS ────────────────────────────────────────────────────────────────────
//

/// A row of the video list. List responses do not carry questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: VideoId,
    pub title: String,
    #[serde(default)]
    pub video_order: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: f64,
}

/// Full video detail, including the quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: VideoId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub video_url: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub video_order: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Video {
    #[must_use]
    pub fn summary(&self) -> VideoSummary {
        VideoSummary {
            id: self.id,
            title: self.title.clone(),
            video_order: self.video_order,
            created_at: self.created_at,
            duration: self.duration,
        }
    }

    /// Questions in display order.
    #[must_use]
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self.questions.iter().collect();
        questions.sort_by_key(|q| (q.order, q.id));
        questions
    }

    /// Rewrites the media URL in place so it can be streamed.
    ///
    /// # Errors
    ///
    /// Returns `VideoError::InvalidUrl` if the stored URL cannot be parsed.
    pub fn fix_media_url(&mut self) -> Result<(), VideoError> {
        self.video_url = playable_video_url(&self.video_url)?.to_string();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default, alias = "displayOrder")]
    pub order: i32,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

impl Question {
    #[must_use]
    pub fn has_option(&self, option: OptionId) -> bool {
        self.options.iter().any(|o| o.id == option)
    }
}

/// One selectable answer. `is_correct` is only present in admin responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Admin-side payload for creating or editing a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub video_url: String,
    pub duration: f64,
    #[serde(default)]
    pub video_order: Option<i64>,
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub text: String,
    #[serde(default)]
    pub order: i32,
    pub options: Vec<OptionDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl VideoDraft {
    /// Prefill an editor from the authoritative detail.
    ///
    /// # Errors
    ///
    /// Returns `VideoError::InvalidUrl` if the stored media URL cannot be parsed.
    pub fn from_video(video: &Video) -> Result<Self, VideoError> {
        let questions = video
            .ordered_questions()
            .into_iter()
            .map(|q| QuestionDraft {
                text: q.text.clone(),
                order: q.order,
                options: q
                    .options
                    .iter()
                    .map(|o| OptionDraft {
                        text: o.text.clone(),
                        is_correct: o.is_correct.unwrap_or(false),
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            title: video.title.clone(),
            description: video.description.clone(),
            video_url: playable_video_url(&video.video_url)?.to_string(),
            duration: video.duration,
            video_order: video.video_order,
            questions,
        })
    }

    /// # Errors
    ///
    /// Returns the first `VideoError` found.
    pub fn validate(&self) -> Result<(), VideoError> {
        if self.title.trim().is_empty() {
            return Err(VideoError::EmptyTitle);
        }
        playable_video_url(&self.video_url)?;
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(VideoError::InvalidDuration(self.duration));
        }
        if self.questions.is_empty() {
            return Err(VideoError::NoQuestions);
        }
        for (index, question) in self.questions.iter().enumerate() {
            if question.text.trim().is_empty() {
                return Err(VideoError::EmptyQuestion { index });
            }
            if question.options.len() < 2 {
                return Err(VideoError::TooFewOptions { index });
            }
            let found = question.options.iter().filter(|o| o.is_correct).count();
            if found != 1 {
                return Err(VideoError::CorrectOptionCount { index, found });
            }
        }
        Ok(())
    }
}
