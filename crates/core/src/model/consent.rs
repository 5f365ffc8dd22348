use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cookie/analytics consent choice. Strictly necessary storage is always on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentPreferences {
    necessary: bool,
    pub analytics: bool,
    pub marketing: bool,
    pub decided_at: DateTime<Utc>,
}

impl ConsentPreferences {
    #[must_use]
    pub fn new(analytics: bool, marketing: bool, decided_at: DateTime<Utc>) -> Self {
        Self {
            necessary: true,
            analytics,
            marketing,
            decided_at,
        }
    }

    #[must_use]
    pub fn accept_all(decided_at: DateTime<Utc>) -> Self {
        Self::new(true, true, decided_at)
    }

    #[must_use]
    pub fn necessary_only(decided_at: DateTime<Utc>) -> Self {
        Self::new(false, false, decided_at)
    }

    #[must_use]
    pub fn necessary(&self) -> bool {
        self.necessary
    }

    /// Re-applies the invariant after loading from storage.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.necessary = true;
        self
    }
}
