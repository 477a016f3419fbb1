#![forbid(unsafe_code)]

//! Core domain model and business logic for setlog.
//!
//! This crate provides:
//! - Domain types (templates, live sessions, completed executions, goals)
//! - Template store and built-in templates
//! - Execution state machine with per-exercise rest timers
//! - Finalizer and execution store (JSONL, in-memory)
//! - Draft persistence for in-progress sessions
//! - Dashboard aggregation and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod templates;
pub mod timer;
pub mod session;
pub mod finalize;
pub mod draft;
pub mod store;
pub mod history;
pub mod stats;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use templates::{default_templates, parse_recommended_reps, MemoryTemplateStore, TemplateStore};
pub use timer::{RestEvent, RestTimer};
pub use session::{start_session, CursorMove, ExecutionSession};
pub use finalize::{finalize, finalize_and_save, FinalizeOptions};
pub use draft::DraftFile;
pub use store::{ExecutionStore, JsonlStore, MemoryStore, Page};
pub use history::load_all_executions;
pub use stats::{dashboard, Dashboard, Period};
