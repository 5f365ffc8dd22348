//! Admin CRUD over users and training videos.
//!
//! Lists are paginated on the server and cached briefly per query; editors
//! always start from a freshly fetched detail; every mutation drops the
//! entity's cached lists.

mod cache;
mod search;
mod users;
mod videos;

use std::fmt;

pub use cache::{LIST_STALE_AFTER, QueryCache, list_key};
pub use search::{SEARCH_DEBOUNCE, debounce};
pub use users::UserAdmin;
pub use videos::VideoAdmin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Video,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Video => "video",
        }
    }

    /// Prefix shared by every cached list query of this entity.
    #[must_use]
    pub fn list_prefix(self) -> String {
        format!("{}:list:", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending deletion awaiting the user's confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest<Id> {
    kind: EntityKind,
    id: Id,
    label: String,
}

impl<Id: Copy + fmt::Display> DeleteRequest<Id> {
    #[must_use]
    pub fn new(kind: EntityKind, id: Id, label: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            label: label.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn id(&self) -> Id {
        self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Text of the confirmation dialog.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!(
            "Delete {} \"{}\" (#{})? This cannot be undone.",
            self.kind, self.label, self.id
        )
    }

    /// The only way to obtain a `ConfirmedDelete`.
    #[must_use]
    pub fn confirm(self) -> ConfirmedDelete<Id> {
        ConfirmedDelete {
            kind: self.kind,
            id: self.id,
        }
    }
}

/// Proof that a deletion was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedDelete<Id> {
    kind: EntityKind,
    id: Id,
}

impl<Id: Copy> ConfirmedDelete<Id> {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn id(&self) -> Id {
        self.id
    }
}
