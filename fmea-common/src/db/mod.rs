//! Worksheet persistence
//!
//! SQLite is the production backend; [`MemoryStore`] backs tests and
//! embedded use.

pub mod init;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use init::init_database;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{AnalysisSummary, CommitPlan, WorksheetStore};
