// Library surface shared by the CLI and integration tests.
pub mod analytics;
pub mod app_dirs;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod curriculum;
pub mod engine;
pub mod error;
pub mod ids;
pub mod keyboard;
pub mod matcher;
pub mod metrics;
pub mod runtime;
pub mod session;
pub mod store;
pub mod util;

pub use engine::{EngineBuilder, SharedEngine, TypingEngine};
pub use error::{CatalogError, EngineError, StorageError};
pub use session::{EndReason, SessionSummary};
