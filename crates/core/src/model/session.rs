use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::user::User;

/// Access/refresh token pair issued by login and refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Login response: tokens plus the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user_dto: User,
}

/// The subset of the auth session that survives a restart.
///
/// Access tokens and authentication flags are never part of it; a restored
/// session must refresh before it is authenticated again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: User,
    pub session_started_at: DateTime<Utc>,
}

impl PersistedSession {
    /// True once `ceiling` has elapsed since the session started.
    #[must_use]
    pub fn is_past_ceiling(&self, now: DateTime<Utc>, ceiling: Duration) -> bool {
        now - self.session_started_at >= ceiling
    }
}
