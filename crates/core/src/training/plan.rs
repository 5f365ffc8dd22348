use std::cmp::Ordering;

use crate::model::{VideoId, VideoSummary};
use crate::training::CompletionSet;

/// Sort videos into training order.
///
/// Explicit `videoOrder` ascending first; videos without one follow. Ties and
/// missing orders fall back to creation time, then ID, so the order is total.
pub fn sort_videos(videos: &mut [VideoSummary]) {
    videos.sort_by(compare_training_order);
}

fn compare_training_order(a: &VideoSummary, b: &VideoSummary) -> Ordering {
    let order_key = |v: &VideoSummary| (v.video_order.is_none(), v.video_order.unwrap_or(0));
    let created_key = |v: &VideoSummary| (v.created_at.is_none(), v.created_at);
    order_key(a)
        .cmp(&order_key(b))
        .then_with(|| created_key(a).cmp(&created_key(b)))
        .then_with(|| a.id.cmp(&b.id))
}

/// Aggregated progress, useful for a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingProgress {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
}

/// The live video order with the trainee's completions subtracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPlan {
    ordered: Vec<VideoId>,
    remaining: Vec<VideoId>,
}

impl TrainingPlan {
    /// `remaining = sorted(live) - completed`, keeping training order.
    ///
    /// IDs in `completed` that are no longer live are ignored.
    #[must_use]
    pub fn new(live: &[VideoSummary], completed: &CompletionSet) -> Self {
        let mut sorted = live.to_vec();
        sort_videos(&mut sorted);

        let mut ordered: Vec<VideoId> = Vec::with_capacity(sorted.len());
        for video in &sorted {
            // duplicate rows across pages must not produce duplicate steps
            if !ordered.contains(&video.id) {
                ordered.push(video.id);
            }
        }
        let remaining = ordered
            .iter()
            .copied()
            .filter(|id| !completed.contains(*id))
            .collect();

        Self { ordered, remaining }
    }

    #[must_use]
    pub fn ordered(&self) -> &[VideoId] {
        &self.ordered
    }

    #[must_use]
    pub fn remaining(&self) -> &[VideoId] {
        &self.remaining
    }

    /// The next unfinished video in order.
    #[must_use]
    pub fn next(&self) -> Option<VideoId> {
        self.remaining.first().copied()
    }

    /// No live videos at all.
    #[must_use]
    pub fn has_no_videos(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Every live video has been passed. Always false for an empty list.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.ordered.is_empty() && self.remaining.is_empty()
    }

    #[must_use]
    pub fn progress(&self) -> TrainingProgress {
        TrainingProgress {
            total: self.ordered.len(),
            completed: self.ordered.len() - self.remaining.len(),
            remaining: self.remaining.len(),
        }
    }

    /// 1-based position of `id` in training order.
    #[must_use]
    pub fn position_of(&self, id: VideoId) -> Option<usize> {
        self.ordered.iter().position(|v| *v == id).map(|p| p + 1)
    }
}
