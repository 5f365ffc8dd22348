use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::session_store::SessionEvent;

use super::ApiClient;

/// Token lifetime and session ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub access_token_ttl: Duration,
    pub refresh_margin: Duration,
    pub session_ceiling: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_margin: Duration::from_secs(60),
            session_ceiling: Duration::from_secs(8 * 60 * 60),
        }
    }
}

impl SessionPolicy {
    /// How long after a rotation the next proactive refresh fires.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.access_token_ttl
            .saturating_sub(self.refresh_margin)
            .max(Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperExit {
    CeilingReached,
    RefreshFailed,
    SignedOut,
    /// Some other caller expired the session.
    Expired,
}

/// Background task that keeps the access token fresh and enforces the
/// session ceiling.
pub struct SessionKeeper {
    client: ApiClient,
    policy: SessionPolicy,
}

impl SessionKeeper {
    #[must_use]
    pub fn new(client: ApiClient, policy: SessionPolicy) -> Self {
        Self { client, policy }
    }

    #[must_use]
    pub fn spawn(self) -> JoinHandle<KeeperExit> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) -> KeeperExit {
        let session = self.client.session().clone();
        let mut events = session.subscribe();

        let Some(started_at) = session.started_at() else {
            return KeeperExit::SignedOut;
        };
        // computed once so token rotation never extends the session
        let elapsed = session
            .clock()
            .elapsed_since(started_at)
            .to_std()
            .unwrap_or_default();
        let ceiling = Instant::now() + self.policy.session_ceiling.saturating_sub(elapsed);
        let mut next_refresh = Instant::now() + self.policy.refresh_interval();

        tracing::debug!(
            remaining_secs = self.policy.session_ceiling.saturating_sub(elapsed).as_secs(),
            "session keeper started"
        );

        loop {
            tokio::select! {
                biased;
                () = sleep_until(ceiling) => {
                    let login_route = session.expire().await;
                    tracing::info!(login_route, "session ceiling reached");
                    return KeeperExit::CeilingReached;
                }
                event = events.recv() => match event {
                    Ok(SessionEvent::SignedOut) => return KeeperExit::SignedOut,
                    Ok(SessionEvent::Expired { .. }) => return KeeperExit::Expired,
                    Ok(SessionEvent::TokenRotated) => {
                        next_refresh = Instant::now() + self.policy.refresh_interval();
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return KeeperExit::SignedOut,
                },
                () = sleep_until(next_refresh) => {
                    if let Err(err) = self.client.refresh_now().await {
                        tracing::warn!(error = %err, "proactive refresh failed");
                        return KeeperExit::RefreshFailed;
                    }
                    next_refresh = Instant::now() + self.policy.refresh_interval();
                }
            }
        }
    }
}
