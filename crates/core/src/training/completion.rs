use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::VideoId;

/// Video IDs a trainee has passed. Serialized as a JSON array of IDs.
///
/// Membership is by ID, so reordering, inserting or deleting videos on the
/// backend never shifts what counts as done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionSet(BTreeSet<VideoId>);

impl CompletionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the ID was not already present.
    pub fn insert(&mut self, id: VideoId) -> bool {
        self.0.insert(id)
    }

    #[must_use]
    pub fn contains(&self, id: VideoId) -> bool {
        self.0.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = VideoId> + '_ {
        self.0.iter().copied()
    }

    /// True when every ID in `live` has been passed.
    #[must_use]
    pub fn covers(&self, live: &[VideoId]) -> bool {
        live.iter().all(|id| self.0.contains(id))
    }
}

impl FromIterator<VideoId> for CompletionSet {
    fn from_iter<I: IntoIterator<Item = VideoId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_as_plain_id_array() {
        let set: CompletionSet = [VideoId::new(9), VideoId::new(3)].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), "[3,9]");
        let back: CompletionSet = serde_json::from_str("[9,3,3]").unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn covers_ignores_stale_ids() {
        let set: CompletionSet = [VideoId::new(1), VideoId::new(2)].into_iter().collect();
        assert!(set.covers(&[VideoId::new(2)]));
        assert!(!set.covers(&[VideoId::new(2), VideoId::new(4)]));
    }
}
