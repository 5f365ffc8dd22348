use async_trait::async_trait;
use chauffeur_core::model::{ConsentPreferences, PersistedSession, UserId};
use chauffeur_core::training::CompletionSet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Per-user record of passed training videos.
///
/// Implementations key strictly by user so trainees sharing a device never
/// see each other's progress.
#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Fetch the completed video set for a user. Unknown users get an empty set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_completions(&self, user: UserId) -> Result<CompletionSet, StorageError>;

    /// Replace the completed video set for a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be stored.
    async fn put_completions(&self, user: UserId, set: &CompletionSet) -> Result<(), StorageError>;
}

/// Persistence for the restart-surviving part of the auth session.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the stored session cannot be read or decoded.
    async fn load_session(&self) -> Result<Option<PersistedSession>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn save_session(&self, session: &PersistedSession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the stored session cannot be removed.
    async fn clear_session(&self) -> Result<(), StorageError>;
}

/// Holder for the rotating refresh token.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_refresh_token(&self) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be stored.
    async fn save_refresh_token(&self, token: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be removed.
    async fn clear_refresh_token(&self) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ConsentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_consent(&self) -> Result<Option<ConsentPreferences>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the preferences cannot be stored.
    async fn save_consent(&self, prefs: &ConsentPreferences) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    completions: Arc<Mutex<HashMap<UserId, CompletionSet>>>,
    session: Arc<Mutex<Option<PersistedSession>>>,
    refresh_token: Arc<Mutex<Option<String>>>,
    consent: Arc<Mutex<Option<ConsentPreferences>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn get_completions(&self, user: UserId) -> Result<CompletionSet, StorageError> {
        let guard = self.completions.lock().map_err(poisoned)?;
        Ok(guard.get(&user).cloned().unwrap_or_default())
    }

    async fn put_completions(&self, user: UserId, set: &CompletionSet) -> Result<(), StorageError> {
        let mut guard = self.completions.lock().map_err(poisoned)?;
        guard.insert(user, set.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn load_session(&self) -> Result<Option<PersistedSession>, StorageError> {
        let guard = self.session.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn save_session(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let mut guard = self.session.lock().map_err(poisoned)?;
        *guard = Some(session.clone());
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        let mut guard = self.session.lock().map_err(poisoned)?;
        *guard = None;
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for InMemoryRepository {
    async fn load_refresh_token(&self) -> Result<Option<String>, StorageError> {
        let guard = self.refresh_token.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn save_refresh_token(&self, token: &str) -> Result<(), StorageError> {
        let mut guard = self.refresh_token.lock().map_err(poisoned)?;
        *guard = Some(token.to_owned());
        Ok(())
    }

    async fn clear_refresh_token(&self) -> Result<(), StorageError> {
        let mut guard = self.refresh_token.lock().map_err(poisoned)?;
        *guard = None;
        Ok(())
    }
}

#[async_trait]
impl ConsentRepository for InMemoryRepository {
    async fn get_consent(&self) -> Result<Option<ConsentPreferences>, StorageError> {
        let guard = self.consent.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn save_consent(&self, prefs: &ConsentPreferences) -> Result<(), StorageError> {
        let mut guard = self.consent.lock().map_err(poisoned)?;
        *guard = Some(prefs.clone());
        Ok(())
    }
}

/// Aggregates the local repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub completions: Arc<dyn CompletionRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub consent: Arc<dyn ConsentRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            completions: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            credentials: Arc::new(repo.clone()),
            consent: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chauffeur_core::model::{Role, User, VideoId};
    use chauffeur_core::time::fixed_now;

    fn user(id: u64) -> User {
        User {
            id: UserId::new(id),
            first_name: "Ada".into(),
            last_name: "Driver".into(),
            email: "ada@example.com".into(),
            phone: None,
            role: Role::Driver,
            is_exam_completed: false,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn completions_are_scoped_per_user() {
        let repo = InMemoryRepository::new();
        let set: CompletionSet = [VideoId::new(3)].into_iter().collect();
        repo.put_completions(UserId::new(1), &set).await.unwrap();

        assert_eq!(repo.get_completions(UserId::new(1)).await.unwrap(), set);
        assert!(repo.get_completions(UserId::new(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_round_trips_and_clears() {
        let repo = InMemoryRepository::new();
        let session = PersistedSession {
            user: user(1),
            session_started_at: fixed_now(),
        };
        repo.save_session(&session).await.unwrap();
        assert_eq!(repo.load_session().await.unwrap(), Some(session));

        repo.clear_session().await.unwrap();
        assert_eq!(repo.load_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn storage_handles_share_one_backend() {
        let storage = Storage::in_memory();
        storage.credentials.save_refresh_token("r1").await.unwrap();
        storage.credentials.save_refresh_token("r2").await.unwrap();
        assert_eq!(
            storage.credentials.load_refresh_token().await.unwrap().as_deref(),
            Some("r2")
        );
    }
}
