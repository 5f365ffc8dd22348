mod assessment;
mod consent;
mod ids;
mod page;
mod session;
mod user;
mod video;

pub use ids::{OptionId, ParseIdError, QuestionId, UserId, VideoId};

pub use assessment::{
    AnswerError, AnswerSheet, AssessmentResult, PASS_THRESHOLD_PERCENT, Submission,
    SubmittedAnswer,
};
pub use consent::ConsentPreferences;
pub use page::{Page, PageRequest};
pub use session::{LoginResponse, PersistedSession, TokenPair};
pub use user::{MIN_PASSWORD_LEN, Registration, Role, User, UserDraft, UserError};
pub use video::{
    AnswerOption, OptionDraft, Question, QuestionDraft, Video, VideoDraft, VideoError,
    VideoSummary, playable_video_url,
};
