//! In-memory worksheet store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::store::{AnalysisSummary, CommitPlan, WorksheetStore};
use crate::model::{AnalysisKey, AtomicBatch, LegacyDocument};
use crate::Result;

#[derive(Debug, Clone)]
struct StoredAnalysis {
    batch: AtomicBatch,
    snapshot: Option<LegacyDocument>,
    updated_at: DateTime<Utc>,
}

/// Store keeping every analysis in a map behind one lock
///
/// A commit builds the new state on a clone and swaps it in under the write
/// lock, so readers never observe a partial save.
#[derive(Debug, Default)]
pub struct MemoryStore {
    analyses: RwLock<HashMap<AnalysisKey, StoredAnalysis>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorksheetStore for MemoryStore {
    async fn load_batch(&self, key: &AnalysisKey) -> Result<Option<AtomicBatch>> {
        Ok(self
            .analyses
            .read()
            .await
            .get(key)
            .map(|stored| stored.batch.clone()))
    }

    async fn load_snapshot(&self, key: &AnalysisKey) -> Result<Option<LegacyDocument>> {
        Ok(self
            .analyses
            .read()
            .await
            .get(key)
            .and_then(|stored| stored.snapshot.clone()))
    }

    async fn commit(&self, plan: CommitPlan) -> Result<()> {
        let mut analyses = self.analyses.write().await;

        let mut next = analyses.get(&plan.key).cloned().unwrap_or_else(|| StoredAnalysis {
            batch: AtomicBatch::new(plan.key.clone()),
            snapshot: None,
            updated_at: Utc::now(),
        });

        next.batch.overlay(plan.batch, &plan.replace);
        if plan.snapshot.is_some() {
            next.snapshot = plan.snapshot;
        }
        next.updated_at = Utc::now();

        analyses.insert(plan.key, next);
        Ok(())
    }

    async fn delete_analysis(&self, key: &AnalysisKey) -> Result<bool> {
        Ok(self.analyses.write().await.remove(key).is_some())
    }

    async fn list_analyses(&self) -> Result<Vec<AnalysisSummary>> {
        let analyses = self.analyses.read().await;
        let mut summaries: Vec<AnalysisSummary> = analyses
            .iter()
            .map(|(key, stored)| AnalysisSummary {
                fmea_id: key.clone(),
                name: stored
                    .batch
                    .l1_structure
                    .as_ref()
                    .map(|l1| l1.name.clone())
                    .unwrap_or_default(),
                updated_at: stored.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.fmea_id.cmp(&b.fmea_id));
        Ok(summaries)
    }
}
