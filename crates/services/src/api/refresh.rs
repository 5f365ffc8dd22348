use std::sync::{Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

/// Why a token refresh failed. Cloneable so every joined caller gets a copy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshFailure {
    #[error("no refresh token is stored")]
    MissingToken,
    #[error("refresh was rejected with status {0}")]
    Rejected(u16),
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("rotated tokens could not be stored: {0}")]
    Storage(String),
}

pub(crate) type RefreshOutcome = Result<String, RefreshFailure>;
pub(crate) type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Single-flight gate for token refreshes.
///
/// The in-flight refresh is cached together with the token generation it was
/// started for; callers that saw the same generation join it instead of
/// starting their own.
#[derive(Default)]
pub(crate) struct RefreshGate {
    inflight: Mutex<Option<(u64, SharedRefresh)>>,
}

impl RefreshGate {
    pub(crate) fn join_or_start(
        &self,
        generation: u64,
        start: impl FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    ) -> SharedRefresh {
        let mut guard = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((started_for, refresh)) = guard.as_ref() {
            if *started_for == generation {
                return refresh.clone();
            }
        }
        let refresh = start().shared();
        *guard = Some((generation, refresh.clone()));
        refresh
    }

    /// Drop the cached refresh once it has resolved.
    pub(crate) fn finish(&self, generation: u64) {
        let mut guard = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(guard.as_ref(), Some((started_for, _)) if *started_for == generation) {
            *guard = None;
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
