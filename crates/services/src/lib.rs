#![forbid(unsafe_code)]

pub mod admin;
pub mod api;
pub mod app_services;
pub mod auth_service;
pub mod backend;
pub mod consent_service;
pub mod error;
pub mod session_store;
pub mod training;

pub use chauffeur_core::Clock;

pub use admin::{ConfirmedDelete, DeleteRequest, EntityKind, UserAdmin, VideoAdmin};
pub use api::{ApiClient, ApiConfig, ApiRequest, KeeperExit, SessionKeeper, SessionPolicy};
pub use app_services::AppServices;
pub use auth_service::{AuthService, Portal};
pub use backend::TrainingBackend;
pub use consent_service::ConsentService;
pub use error::{AdminError, ApiError, AppServicesError, AuthError, TrainingError};
pub use session_store::{SessionEvent, SessionSnapshot, SessionStore};
pub use training::{
    ActiveVideo, FetchStage, FinalizeStatus, SubmissionOutcome, TrainingFlow, TrainingState,
};
