//! # FMEA Common Library
//!
//! Shared code for the FMEA worksheet service including:
//! - Atomic entity model and the legacy nested-tree document
//! - Completeness scoring and the overwrite guard
//! - Foreign-key validation of candidate batches
//! - Legacy ⇄ atomic migration
//! - Failure-chain grouping for merged-row rendering
//! - Storage (SQLite and in-memory) and the save/load orchestrator
//! - Configuration loading

pub mod chain;
pub mod config;
pub mod db;
pub mod error;
pub mod flatten;
pub mod ids;
pub mod migrate;
pub mod model;
pub mod orchestrator;
pub mod score;
pub mod validate;

pub use error::{Error, FailureClass, Result};
pub use model::{AnalysisKey, AtomicBatch, AtomicPayload, EntityKind};
