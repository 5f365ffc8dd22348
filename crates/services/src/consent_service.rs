use std::sync::Arc;

use chauffeur_core::model::ConsentPreferences;
use storage::repository::{ConsentRepository, StorageError};

use crate::Clock;

/// Cookie and analytics consent. Strictly necessary storage is always on.
#[derive(Clone)]
pub struct ConsentService {
    clock: Clock,
    repo: Arc<dyn ConsentRepository>,
}

impl ConsentService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn ConsentRepository>) -> Self {
        Self { clock, repo }
    }

    /// The stored decision, or `None` if the user has not chosen yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    pub async fn load(&self) -> Result<Option<ConsentPreferences>, StorageError> {
        Ok(self.repo.get_consent().await?.map(ConsentPreferences::normalized))
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the preferences cannot be stored.
    pub async fn save(
        &self,
        analytics: bool,
        marketing: bool,
    ) -> Result<ConsentPreferences, StorageError> {
        self.store(ConsentPreferences::new(analytics, marketing, self.clock.now()))
            .await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the preferences cannot be stored.
    pub async fn accept_all(&self) -> Result<ConsentPreferences, StorageError> {
        self.store(ConsentPreferences::accept_all(self.clock.now()))
            .await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the preferences cannot be stored.
    pub async fn necessary_only(&self) -> Result<ConsentPreferences, StorageError> {
        self.store(ConsentPreferences::necessary_only(self.clock.now()))
            .await
    }

    async fn store(&self, prefs: ConsentPreferences) -> Result<ConsentPreferences, StorageError> {
        self.repo.save_consent(&prefs).await?;
        tracing::info!(
            analytics = prefs.analytics,
            marketing = prefs.marketing,
            "consent recorded"
        );
        Ok(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chauffeur_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn undecided_until_saved() {
        let service = ConsentService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        assert_eq!(service.load().await.unwrap(), None);

        service.necessary_only().await.unwrap();
        let prefs = service.load().await.unwrap().expect("decided");
        assert!(prefs.necessary());
        assert!(!prefs.analytics);
        assert!(!prefs.marketing);
        assert_eq!(prefs.decided_at, fixed_now());
    }

    #[tokio::test]
    async fn later_decision_replaces_earlier() {
        let service = ConsentService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        service.necessary_only().await.unwrap();
        service.accept_all().await.unwrap();

        let prefs = service.load().await.unwrap().expect("decided");
        assert!(prefs.analytics && prefs.marketing);
    }
}
