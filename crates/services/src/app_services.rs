use std::sync::Arc;

use storage::repository::{CompletionRepository, Storage};

use crate::Clock;
use crate::admin::{UserAdmin, VideoAdmin};
use crate::api::{ApiClient, ApiConfig, SessionKeeper, SessionPolicy};
use crate::auth_service::AuthService;
use crate::consent_service::ConsentService;
use crate::error::AppServicesError;
use crate::session_store::SessionStore;
use crate::training::TrainingFlow;

/// Assembles the client-facing services around one session and API client.
#[derive(Clone)]
pub struct AppServices {
    client: ApiClient,
    policy: SessionPolicy,
    completions: Arc<dyn CompletionRepository>,
    auth: Arc<AuthService>,
    users: Arc<UserAdmin>,
    videos: Arc<VideoAdmin>,
    consent: Arc<ConsentService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or client setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        api: ApiConfig,
        clock: Clock,
        policy: SessionPolicy,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::new_with_storage(storage, api, clock, policy)
    }

    /// Build services over an already constructed storage aggregate.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Api` if the HTTP client cannot be built.
    pub fn new_with_storage(
        storage: Storage,
        api: ApiConfig,
        clock: Clock,
        policy: SessionPolicy,
    ) -> Result<Self, AppServicesError> {
        let session = SessionStore::new(
            clock,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.credentials),
        );
        let client = ApiClient::new(api, session)?;

        Ok(Self {
            auth: Arc::new(AuthService::new(client.clone(), policy)),
            users: Arc::new(UserAdmin::new(client.clone())),
            videos: Arc::new(VideoAdmin::new(client.clone())),
            consent: Arc::new(ConsentService::new(clock, Arc::clone(&storage.consent))),
            completions: Arc::clone(&storage.completions),
            client,
            policy,
        })
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        self.client.session()
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserAdmin> {
        Arc::clone(&self.users)
    }

    #[must_use]
    pub fn videos(&self) -> Arc<VideoAdmin> {
        Arc::clone(&self.videos)
    }

    #[must_use]
    pub fn consent(&self) -> Arc<ConsentService> {
        Arc::clone(&self.consent)
    }

    /// A fresh training flow for the signed-in trainee.
    #[must_use]
    pub fn training_flow(&self) -> TrainingFlow {
        TrainingFlow::new(
            Arc::new(self.client.clone()),
            Arc::clone(&self.completions),
            self.session().clone(),
        )
    }

    /// Background refresh and ceiling enforcement for the current session.
    #[must_use]
    pub fn session_keeper(&self) -> SessionKeeper {
        SessionKeeper::new(self.client.clone(), self.policy)
    }
}
