//! Explicitly injected auth session.
//!
//! Holds the signed-in user and the in-memory access token. Only the
//! `PersistedSession` subset (user identity + session start) is written to
//! the session repository; the refresh token goes to the credential
//! repository; the access token is never persisted.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chauffeur_core::Clock;
use chauffeur_core::model::{PersistedSession, Role, TokenPair, User, UserId};
use chrono::{DateTime, Utc};
use storage::repository::{CredentialRepository, SessionRepository, StorageError};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;
const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Notifications for whoever drives navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(UserId),
    TokenRotated,
    UserUpdated(UserId),
    SignedOut,
    /// The session was cleared because refresh failed or the ceiling passed.
    Expired { login_route: &'static str },
}

/// Read-only copy of the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub token_generation: u64,
    pub session_started_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    access_token: Option<String>,
    // bumped whenever the access token changes or is dropped
    generation: u64,
    started_at: Option<DateTime<Utc>>,
    last_login_route: Option<&'static str>,
}

#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<SessionState>>,
    sessions: Arc<dyn SessionRepository>,
    credentials: Arc<dyn CredentialRepository>,
    events: broadcast::Sender<SessionEvent>,
    clock: Clock,
}

impl SessionStore {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionRepository>,
        credentials: Arc<dyn CredentialRepository>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            sessions,
            credentials,
            events,
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Load the persisted slice after a restart.
    ///
    /// The restored session has a user but no access token; callers must
    /// refresh before making authenticated requests.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the persisted session cannot be read.
    pub async fn restore(&self) -> Result<Option<User>, StorageError> {
        let persisted = self.sessions.load_session().await?;
        let mut state = self.write();
        state.access_token = None;
        state.generation += 1;
        match persisted {
            Some(session) => {
                state.user = Some(session.user.clone());
                state.started_at = Some(session.session_started_at);
                Ok(Some(session.user))
            }
            None => {
                state.user = None;
                state.started_at = None;
                Ok(None)
            }
        }
    }

    /// Start a new session after a successful login.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session slice or refresh token cannot be stored.
    pub async fn sign_in(&self, user: User, tokens: &TokenPair) -> Result<(), StorageError> {
        let started_at = self.clock.now();
        let persisted = PersistedSession {
            user: user.clone(),
            session_started_at: started_at,
        };
        self.sessions.save_session(&persisted).await?;
        self.credentials
            .save_refresh_token(&tokens.refresh_token)
            .await?;

        let user_id = user.id;
        {
            let mut state = self.write();
            state.user = Some(user);
            state.access_token = Some(tokens.access_token.clone());
            state.generation += 1;
            state.started_at = Some(started_at);
            state.last_login_route = None;
        }
        self.emit(SessionEvent::SignedIn(user_id));
        Ok(())
    }

    /// Install a rotated token pair. Returns the new token generation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the new refresh token cannot be stored.
    pub async fn rotate_tokens(&self, tokens: &TokenPair) -> Result<u64, StorageError> {
        self.credentials
            .save_refresh_token(&tokens.refresh_token)
            .await?;
        let generation = {
            let mut state = self.write();
            state.access_token = Some(tokens.access_token.clone());
            state.generation += 1;
            state.generation
        };
        self.emit(SessionEvent::TokenRotated);
        Ok(generation)
    }

    /// Replace the signed-in user, e.g. after re-fetching the profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the persisted slice cannot be updated.
    pub async fn update_user(&self, user: User) -> Result<(), StorageError> {
        let started_at = self.read().started_at;
        if let Some(session_started_at) = started_at {
            self.sessions
                .save_session(&PersistedSession {
                    user: user.clone(),
                    session_started_at,
                })
                .await?;
        }
        let user_id = user.id;
        self.write().user = Some(user);
        self.emit(SessionEvent::UserUpdated(user_id));
        Ok(())
    }

    /// Clear the session on explicit logout.
    pub async fn sign_out(&self) {
        self.clear_local().await;
        self.emit(SessionEvent::SignedOut);
    }

    /// Clear the session after a failed refresh or the ceiling passing.
    ///
    /// Returns the login route appropriate for the user that was signed in.
    pub async fn expire(&self) -> &'static str {
        let login_route = self.login_route();
        self.clear_local().await;
        self.write().last_login_route = Some(login_route);
        tracing::info!(login_route, "session expired");
        self.emit(SessionEvent::Expired { login_route });
        login_route
    }

    async fn clear_local(&self) {
        {
            let mut state = self.write();
            state.user = None;
            state.access_token = None;
            state.generation += 1;
            state.started_at = None;
        }
        if let Err(err) = self.sessions.clear_session().await {
            tracing::warn!(error = %err, "failed to clear persisted session");
        }
        if let Err(err) = self.credentials.clear_refresh_token().await {
            tracing::warn!(error = %err, "failed to clear refresh token");
        }
    }

    /// Stored refresh token, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the credential store cannot be read.
    pub async fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.credentials.load_refresh_token().await
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.read();
        SessionSnapshot {
            user: state.user.clone(),
            access_token: state.access_token.clone(),
            token_generation: state.generation,
            session_started_at: state.started_at,
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    /// Current access token together with its generation.
    #[must_use]
    pub fn access_token(&self) -> Option<(String, u64)> {
        let state = self.read();
        state
            .access_token
            .clone()
            .map(|token| (token, state.generation))
    }

    #[must_use]
    pub fn token_generation(&self) -> u64 {
        self.read().generation
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.read().started_at
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.read().user.as_ref().map(|u| u.role)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let state = self.read();
        state.user.is_some() && state.access_token.is_some()
    }

    /// Where to send the user to sign in again.
    #[must_use]
    pub fn login_route(&self) -> &'static str {
        let state = self.read();
        match (&state.user, state.last_login_route) {
            (Some(user), _) => user.role.login_route(),
            (None, Some(route)) => route,
            (None, None) => DEFAULT_LOGIN_ROUTE,
        }
    }

    /// The subset that would be written to storage for the current state.
    #[must_use]
    pub fn persisted(&self) -> Option<PersistedSession> {
        let state = self.read();
        match (&state.user, state.started_at) {
            (Some(user), Some(session_started_at)) => Some(PersistedSession {
                user: user.clone(),
                session_started_at,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chauffeur_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn user(role: Role) -> User {
        User {
            id: UserId::new(1),
            first_name: "Ada".into(),
            last_name: "Driver".into(),
            email: "ada@example.com".into(),
            phone: None,
            role,
            is_exam_completed: false,
            created_at: None,
        }
    }

    fn tokens(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access_token: access.into(),
            refresh_token: refresh.into(),
        }
    }

    fn store(repo: &InMemoryRepository) -> SessionStore {
        SessionStore::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn access_token_is_not_persisted() {
        let repo = InMemoryRepository::new();
        let session = store(&repo);
        session
            .sign_in(user(Role::Driver), &tokens("a1", "r1"))
            .await
            .unwrap();
        assert!(session.is_authenticated());

        // a fresh store over the same storage only gets the persisted slice
        let restored = store(&repo);
        let user = restored.restore().await.unwrap().expect("user restored");
        assert_eq!(user.id, UserId::new(1));
        assert_eq!(restored.started_at(), Some(fixed_now()));
        assert!(!restored.is_authenticated());
        assert_eq!(restored.access_token(), None);
        assert_eq!(
            restored.refresh_token().await.unwrap().as_deref(),
            Some("r1")
        );
    }

    #[tokio::test]
    async fn rotation_bumps_generation() {
        let repo = InMemoryRepository::new();
        let session = store(&repo);
        session
            .sign_in(user(Role::Driver), &tokens("a1", "r1"))
            .await
            .unwrap();
        let (_, before) = session.access_token().unwrap();

        let after = session.rotate_tokens(&tokens("a2", "r2")).await.unwrap();
        assert!(after > before);
        assert_eq!(session.access_token(), Some(("a2".to_string(), after)));
        assert_eq!(session.refresh_token().await.unwrap().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn expiry_clears_everything_and_remembers_route() {
        let repo = InMemoryRepository::new();
        let session = store(&repo);
        let mut events = session.subscribe();
        session
            .sign_in(user(Role::Admin), &tokens("a1", "r1"))
            .await
            .unwrap();

        assert_eq!(session.expire().await, "/admin/login");
        assert_eq!(session.user(), None);
        assert_eq!(session.persisted(), None);
        assert_eq!(session.refresh_token().await.unwrap(), None);
        assert_eq!(session.login_route(), "/admin/login");

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SignedIn(UserId::new(1))
        );
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Expired {
                login_route: "/admin/login"
            }
        );
    }

    #[tokio::test]
    async fn update_user_rewrites_persisted_slice() {
        let repo = InMemoryRepository::new();
        let session = store(&repo);
        session
            .sign_in(user(Role::Driver), &tokens("a1", "r1"))
            .await
            .unwrap();

        let mut done = user(Role::Driver);
        done.is_exam_completed = true;
        session.update_user(done).await.unwrap();

        let persisted = repo.load_session().await.unwrap().unwrap();
        assert!(persisted.user.is_exam_completed);
        assert_eq!(persisted.session_started_at, fixed_now());
    }
}
