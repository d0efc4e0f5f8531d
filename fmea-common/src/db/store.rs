//! Storage seam between the save/load orchestrator and a backend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::model::{AnalysisKey, AtomicBatch, EntityKind, LegacyDocument};
use crate::Result;

/// Everything one save writes, applied atomically
#[derive(Debug, Clone)]
pub struct CommitPlan {
    pub key: AnalysisKey,
    /// Kinds whose stored rows are deleted and replaced by `batch`
    pub replace: BTreeSet<EntityKind>,
    pub batch: AtomicBatch,
    /// Legacy snapshot to store alongside, if any
    pub snapshot: Option<LegacyDocument>,
}

/// Row of the analysis listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub fmea_id: AnalysisKey,
    /// Top-level structure name, empty when none is stored
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

/// Persistent worksheet storage
///
/// `commit` must be all-or-nothing: after an error the stored state is the
/// state before the call.
#[async_trait]
pub trait WorksheetStore: Send + Sync {
    /// Every stored record of one analysis, `None` if the key was never saved
    async fn load_batch(&self, key: &AnalysisKey) -> Result<Option<AtomicBatch>>;

    async fn load_snapshot(&self, key: &AnalysisKey) -> Result<Option<LegacyDocument>>;

    async fn commit(&self, plan: CommitPlan) -> Result<()>;

    /// Remove an analysis and all of its rows; false if it did not exist
    async fn delete_analysis(&self, key: &AnalysisKey) -> Result<bool>;

    async fn list_analyses(&self) -> Result<Vec<AnalysisSummary>>;
}
