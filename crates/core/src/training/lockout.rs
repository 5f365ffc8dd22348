/// How far past the furthest watched point playback may move before it is
/// treated as skipping ahead. Covers jitter between player progress ticks.
pub const SEEK_TOLERANCE_SECS: f64 = 0.5;

/// Player events the lockout reacts to. Positions are in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    /// Regular progress tick while playing.
    Progress(f64),
    /// The user moved the playhead.
    Seek(f64),
    /// The video reached its end.
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackDecision {
    /// The position stands.
    Accept { position: f64 },
    /// The move was ahead of what was watched; the player must jump back.
    SnapBack { position: f64 },
    /// The video finished; seeking and the quiz are now unlocked.
    Unlocked,
}

/// Prevents skipping ahead of the furthest point watched until the video ends.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchLockout {
    max_watched: f64,
    position: f64,
    ended: bool,
    tolerance: f64,
}

impl Default for WatchLockout {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchLockout {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tolerance(SEEK_TOLERANCE_SECS)
    }

    #[must_use]
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            max_watched: 0.0,
            position: 0.0,
            ended: false,
            tolerance: if tolerance.is_finite() {
                tolerance.max(0.0)
            } else {
                SEEK_TOLERANCE_SECS
            },
        }
    }

    pub fn handle(&mut self, event: PlaybackEvent) -> PlaybackDecision {
        match event {
            PlaybackEvent::Ended => {
                self.ended = true;
                self.max_watched = self.max_watched.max(self.position);
                PlaybackDecision::Unlocked
            }
            PlaybackEvent::Progress(target) | PlaybackEvent::Seek(target) => self.move_to(target),
        }
    }

    fn move_to(&mut self, target: f64) -> PlaybackDecision {
        if !target.is_finite() {
            self.position = self.max_watched;
            return PlaybackDecision::SnapBack {
                position: self.max_watched,
            };
        }
        let target = target.max(0.0);

        if !self.ended && target > self.max_watched + self.tolerance {
            self.position = self.max_watched;
            return PlaybackDecision::SnapBack {
                position: self.max_watched,
            };
        }

        self.position = target;
        self.max_watched = self.max_watched.max(target);
        PlaybackDecision::Accept { position: target }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        !self.ended
    }

    /// The quiz may only be answered once the video has ended.
    #[must_use]
    pub fn quiz_unlocked(&self) -> bool {
        self.ended
    }

    #[must_use]
    pub fn max_watched(&self) -> f64 {
        self.max_watched
    }

    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }
}
