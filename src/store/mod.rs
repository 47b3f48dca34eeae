//! Persistence layer: key-value storage with typed history and credential views.

pub mod credential;
pub mod history;
pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use credential::{API_KEY_KEY, CredentialStore};
pub use history::{HISTORY_LIMIT, HistoryEntry, HistoryStore, history_key};
pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryStore;
pub use traits::KeyValueStore;
