#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CompletionRepository, ConsentRepository, CredentialRepository, InMemoryRepository,
    SessionRepository, Storage, StorageError,
};
