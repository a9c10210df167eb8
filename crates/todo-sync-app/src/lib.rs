//! Application layer for todo-sync.
//!
//! This crate holds the stateful task store, the auth gate it enforces, the
//! repository and session seams that backends implement, and configuration
//! shared by front ends.

pub mod config;
pub mod error;
pub mod optimistic;
pub mod repository;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use config::{AppConfig, BackendConfig, DisplayConfig, OffsetParseError, OffsetSetting};
pub use error::{RepositoryOp, StoreError};
pub use optimistic::Revert;
pub use repository::RemoteTaskRepository;
pub use session::{Identity, SessionHandle, SessionProvider, SessionState, SessionTransition, classify};
pub use store::{LoadOutcome, LoadStatus, TaskStore};
