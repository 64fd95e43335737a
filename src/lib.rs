#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable at least one of the `inmem-store` or `postgres-store` features");

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod moderation;
pub mod openapi;
pub mod paths;
pub mod repo;
pub mod routes;
pub mod slug;
pub mod storage;
pub mod workflow;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use workflow::DraftWorkflow;
