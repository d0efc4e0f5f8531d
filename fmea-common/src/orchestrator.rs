//! Save/load orchestration
//!
//! A save runs `Received → Guarded → Validated → Committing → Done`, or ends
//! early in `Rejected` (overwrite guard) or `Failed` (any error). Every error
//! is caught here and reported as [`SaveOutcome::Failed`] with its
//! [`FailureClass`], so callers never see a half-applied save.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::chain::{FailureChainGrouper, FmGroup};
use crate::config::TomlConfig;
use crate::db::{AnalysisSummary, CommitPlan, WorksheetStore};
use crate::flatten::flatten_links;
use crate::ids::IdMinter;
use crate::migrate::{legacy_kinds, to_atomic, to_legacy, MigrationWarning};
use crate::model::{AnalysisKey, AtomicBatch, AtomicPayload, EntityKind, LegacyDocument};
use crate::score::{GuardPolicy, GuardVerdict};
use crate::validate::{validate_batch, AcceptedKeys, Rejection};
use crate::{Error, FailureClass, Result};

/// One save call
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(default)]
    pub fmea_id: String,
    /// Kinds present here replace their stored rows
    #[serde(default)]
    pub atomic: Option<AtomicPayload>,
    /// Authoritative for display; replaces every kind it can express
    #[serde(default)]
    pub legacy: Option<LegacyDocument>,
    /// Skip the overwrite guard
    #[serde(default)]
    pub force_overwrite: bool,
}

/// What a committed save wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub fmea_id: AnalysisKey,
    pub replaced: Vec<EntityKind>,
    /// Rows written per kind
    pub written: BTreeMap<EntityKind, usize>,
    /// Records of this save dropped by validation
    pub rejections: Vec<Rejection>,
    /// Previously stored records removed because their parent is gone
    pub cascaded: Vec<Rejection>,
    pub warnings: Vec<MigrationWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    Committed(SaveReport),
    #[serde(rename_all = "camelCase")]
    RejectedByGuard {
        fmea_id: AnalysisKey,
        #[serde(flatten)]
        verdict: GuardVerdict,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        fmea_id: String,
        class: FailureClass,
        message: String,
    },
}

impl SaveOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SaveOutcome::Committed(_))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    #[serde(default)]
    pub fmea_id: String,
    /// Return the atomic batch instead of the legacy tree
    #[serde(default)]
    pub raw: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", content = "data", rename_all = "snake_case")]
pub enum LoadOutcome {
    Legacy(LegacyDocument),
    Atomic(AtomicBatch),
}

/// Save state machine position, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    Received,
    Guarded,
    Validated,
    Committing,
    Done,
    Rejected,
    Failed,
}

impl fmt::Display for SaveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn enter(key: &str, stage: SaveStage) {
    debug!(fmea_id = %key, stage = %stage, "Save stage");
}

/// Coordinates guard, migration, validation and the store commit
pub struct Orchestrator {
    store: Arc<dyn WorksheetStore>,
    policy: GuardPolicy,
    commit_timeout: Duration,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn WorksheetStore>) -> Self {
        Self {
            store,
            policy: GuardPolicy::default(),
            commit_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(store: Arc<dyn WorksheetStore>, config: &TomlConfig) -> Self {
        Self::new(store)
            .with_policy(config.guard)
            .with_commit_timeout(config.persistence.commit_timeout())
    }

    pub fn with_policy(mut self, policy: GuardPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Run one save to completion; never returns an error
    pub async fn save(&self, request: SaveRequest) -> SaveOutcome {
        let raw_key = request.fmea_id.trim().to_uppercase();

        match self.try_save(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                enter(&raw_key, SaveStage::Failed);
                warn!(fmea_id = %raw_key, class = ?e.class(), "Save failed: {}", e);
                SaveOutcome::Failed {
                    fmea_id: raw_key,
                    class: e.class(),
                    message: e.to_string(),
                }
            }
        }
    }

    async fn try_save(&self, request: SaveRequest) -> Result<SaveOutcome> {
        let key = AnalysisKey::parse(&request.fmea_id)?;
        enter(key.as_str(), SaveStage::Received);

        let SaveRequest {
            atomic,
            legacy,
            force_overwrite,
            ..
        } = request;
        let atomic = atomic.filter(|payload| !payload.is_empty());
        if legacy.is_none() && atomic.is_none() {
            return Err(Error::MalformedInput(
                "save carries neither a legacy snapshot nor atomic records".to_string(),
            ));
        }

        let mut ids = IdMinter::derived(&key);
        let mut legacy = legacy;
        if let Some(doc) = legacy.as_mut() {
            doc.assign_missing_ids(&mut ids);
        }

        // Structural checks come before any store access
        let mut batch = AtomicBatch::new(key.clone());
        let mut replace = BTreeSet::new();
        let mut warnings = Vec::new();

        if let Some(doc) = &legacy {
            let migrated = to_atomic(&key, doc, &mut ids);
            batch = migrated.value;
            warnings = migrated.warnings;
            replace = legacy_kinds(doc);
        }
        if let Some(payload) = atomic {
            let (records, kinds) = payload.into_parts(&key);
            batch.overlay(records, &kinds);
            replace.extend(kinds);
        }
        batch.check_unique_ids()?;

        let stored_batch = self.store.load_batch(&key).await?;
        let stored_snapshot = self.store.load_snapshot(&key).await?;

        if let Some(doc) = &legacy {
            let reconstructed;
            let existing = match (&stored_snapshot, &stored_batch) {
                (Some(snapshot), _) => Some(snapshot),
                (None, Some(batch)) => {
                    reconstructed = to_legacy(batch);
                    Some(&reconstructed)
                }
                (None, None) => None,
            };

            let verdict = self.policy.compare(Some(doc), existing);
            if let Some(rule) = verdict.rule {
                if force_overwrite {
                    warn!(
                        fmea_id = %key,
                        "Overwrite guard bypassed by force flag: {}",
                        rule.describe()
                    );
                } else {
                    enter(key.as_str(), SaveStage::Rejected);
                    warn!(
                        fmea_id = %key,
                        incoming = verdict.incoming_score,
                        existing = verdict.existing_score,
                        "Save rejected by overwrite guard: {}",
                        rule.describe()
                    );
                    return Ok(SaveOutcome::RejectedByGuard {
                        fmea_id: key,
                        verdict,
                        reason: rule.describe().to_string(),
                    });
                }
            }
        }
        enter(key.as_str(), SaveStage::Guarded);

        let regenerate_analyses = replace.contains(&EntityKind::FailureLink)
            || replace.contains(&EntityKind::ConfirmedState);
        if regenerate_analyses {
            batch.failure_analyses.clear();
            replace.insert(EntityKind::FailureAnalysis);
        }

        let mut seeds = AcceptedKeys::new();
        if let Some(stored) = &stored_batch {
            for kind in EntityKind::ALL {
                if !replace.contains(&kind) {
                    seeds.seed(kind, stored.ids_of(kind));
                }
            }
        }

        let report = validate_batch(&mut batch, &seeds);

        // Analysis rows are built from accepted links only
        if regenerate_analyses {
            let view = merged_view(&key, stored_batch.as_ref(), &batch, &replace);
            let confirmed = view.confirmed.as_ref().is_some_and(|c| c.failure_link);
            batch.failure_analyses = if confirmed {
                flatten_links(&view)
            } else {
                Vec::new()
            };
        }

        // Stored rows of untouched kinds whose parent this save removed
        let mut view = merged_view(&key, stored_batch.as_ref(), &batch, &replace);
        let cascade = validate_batch(&mut view, &AcceptedKeys::new());
        replace.extend(cascade.rejections.iter().map(|r| r.kind));
        enter(key.as_str(), SaveStage::Validated);

        let mut snapshot = match legacy {
            Some(mut doc) => {
                if doc.risks.is_none() {
                    doc.risks = to_legacy(&view).risks;
                }
                doc
            }
            None => to_legacy(&view),
        };
        if let Some(existing) = &stored_snapshot {
            snapshot.merge_registration(existing);
        }

        let written = replace.iter().map(|k| (*k, view.len_of(*k))).collect();
        let plan = CommitPlan {
            key: key.clone(),
            replace: replace.clone(),
            batch: view,
            snapshot: Some(snapshot),
        };

        enter(key.as_str(), SaveStage::Committing);
        match tokio::time::timeout(self.commit_timeout, self.store.commit(plan)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Transient(format!(
                    "commit exceeded {} ms",
                    self.commit_timeout.as_millis()
                )))
            }
        }
        enter(key.as_str(), SaveStage::Done);

        info!(
            fmea_id = %key,
            kinds = replace.len(),
            rejected = report.rejections.len(),
            cascaded = cascade.rejections.len(),
            warnings = warnings.len(),
            "Saved analysis"
        );

        Ok(SaveOutcome::Committed(SaveReport {
            fmea_id: key,
            replaced: replace.into_iter().collect(),
            written,
            rejections: report.rejections,
            cascaded: cascade.rejections,
            warnings,
        }))
    }

    /// Stored snapshot (or reconstruction), or the raw batch when `raw` is set
    pub async fn load(&self, request: LoadRequest) -> Result<LoadOutcome> {
        let key = AnalysisKey::parse(&request.fmea_id)?;

        if request.raw {
            return self
                .store
                .load_batch(&key)
                .await?
                .map(LoadOutcome::Atomic)
                .ok_or_else(|| Error::NotFound(key.to_string()));
        }

        if let Some(snapshot) = self.store.load_snapshot(&key).await? {
            return Ok(LoadOutcome::Legacy(snapshot));
        }

        match self.store.load_batch(&key).await? {
            Some(batch) => {
                debug!(fmea_id = %key, "No stored snapshot, reconstructing from atomic rows");
                Ok(LoadOutcome::Legacy(to_legacy(&batch)))
            }
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    /// Failure-chain groups of a stored analysis
    pub async fn failure_chains(&self, fmea_id: &str) -> Result<Vec<FmGroup>> {
        let key = AnalysisKey::parse(fmea_id)?;
        let batch = self
            .store
            .load_batch(&key)
            .await?
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        Ok(FailureChainGrouper::from_batch(&batch))
    }

    pub async fn delete(&self, fmea_id: &str) -> Result<bool> {
        let key = AnalysisKey::parse(fmea_id)?;
        self.store.delete_analysis(&key).await
    }

    pub async fn list(&self) -> Result<Vec<AnalysisSummary>> {
        self.store.list_analyses().await
    }
}

/// Stored rows with the replaced kinds swapped for `batch`
fn merged_view(
    key: &AnalysisKey,
    stored: Option<&AtomicBatch>,
    batch: &AtomicBatch,
    replace: &BTreeSet<EntityKind>,
) -> AtomicBatch {
    let mut view = stored
        .cloned()
        .unwrap_or_else(|| AtomicBatch::new(key.clone()));
    view.overlay(batch.clone(), replace);
    view
}
