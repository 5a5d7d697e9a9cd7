#![forbid(unsafe_code)]

pub mod cooldown_repo;
pub mod layout;
pub mod repository;
pub mod sqlite;

pub use cooldown_repo::CooldownStore;
pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
