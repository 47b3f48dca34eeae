//! Page Assist: ask a model about the active page, keep per-domain history.

pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod page;
pub mod prompt;
pub mod server;
pub mod store;
