//! One analysis' worth of atomic records

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::entities::*;
use super::{AnalysisKey, EntityKind, Record};
use crate::{Error, Result};

/// Every atomic record of one analysis, grouped by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicBatch {
    pub fmea_id: AnalysisKey,
    #[serde(default)]
    pub l1_structure: Option<L1Structure>,
    #[serde(default)]
    pub l2_structures: Vec<L2Structure>,
    #[serde(default)]
    pub l3_structures: Vec<L3Structure>,
    #[serde(default)]
    pub l1_functions: Vec<L1Function>,
    #[serde(default)]
    pub l2_functions: Vec<L2Function>,
    #[serde(default)]
    pub l3_functions: Vec<L3Function>,
    #[serde(default)]
    pub failure_effects: Vec<FailureEffect>,
    #[serde(default)]
    pub failure_modes: Vec<FailureMode>,
    #[serde(default)]
    pub failure_causes: Vec<FailureCause>,
    #[serde(default)]
    pub failure_links: Vec<FailureLink>,
    #[serde(default)]
    pub failure_analyses: Vec<FailureAnalysis>,
    #[serde(default)]
    pub risk_analyses: Vec<RiskAnalysis>,
    #[serde(default)]
    pub optimizations: Vec<Optimization>,
    #[serde(default)]
    pub confirmed: Option<ConfirmedState>,
}

fn ids_of<T: Record>(records: &[T]) -> Vec<String> {
    records.iter().map(|r| r.id().to_string()).collect()
}

fn first_duplicate<T: Record>(records: &[T]) -> Option<&str> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| r.id())
        .find(|id| !seen.insert(*id))
}

impl AtomicBatch {
    pub fn new(fmea_id: AnalysisKey) -> Self {
        Self {
            fmea_id,
            l1_structure: None,
            l2_structures: Vec::new(),
            l3_structures: Vec::new(),
            l1_functions: Vec::new(),
            l2_functions: Vec::new(),
            l3_functions: Vec::new(),
            failure_effects: Vec::new(),
            failure_modes: Vec::new(),
            failure_causes: Vec::new(),
            failure_links: Vec::new(),
            failure_analyses: Vec::new(),
            risk_analyses: Vec::new(),
            optimizations: Vec::new(),
            confirmed: None,
        }
    }

    /// IDs of every record of one kind, in batch order
    pub fn ids_of(&self, kind: EntityKind) -> Vec<String> {
        match kind {
            EntityKind::L1Structure => self.l1_structure.iter().map(|s| s.id.clone()).collect(),
            EntityKind::L2Structure => ids_of(&self.l2_structures),
            EntityKind::L3Structure => ids_of(&self.l3_structures),
            EntityKind::L1Function => ids_of(&self.l1_functions),
            EntityKind::L2Function => ids_of(&self.l2_functions),
            EntityKind::L3Function => ids_of(&self.l3_functions),
            EntityKind::FailureEffect => ids_of(&self.failure_effects),
            EntityKind::FailureMode => ids_of(&self.failure_modes),
            EntityKind::FailureCause => ids_of(&self.failure_causes),
            EntityKind::FailureLink => ids_of(&self.failure_links),
            EntityKind::FailureAnalysis => ids_of(&self.failure_analyses),
            EntityKind::RiskAnalysis => ids_of(&self.risk_analyses),
            EntityKind::Optimization => ids_of(&self.optimizations),
            EntityKind::ConfirmedState => self
                .confirmed
                .iter()
                .map(|c| c.id().to_string())
                .collect(),
        }
    }

    pub fn len_of(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::L1Structure => usize::from(self.l1_structure.is_some()),
            EntityKind::L2Structure => self.l2_structures.len(),
            EntityKind::L3Structure => self.l3_structures.len(),
            EntityKind::L1Function => self.l1_functions.len(),
            EntityKind::L2Function => self.l2_functions.len(),
            EntityKind::L3Function => self.l3_functions.len(),
            EntityKind::FailureEffect => self.failure_effects.len(),
            EntityKind::FailureMode => self.failure_modes.len(),
            EntityKind::FailureCause => self.failure_causes.len(),
            EntityKind::FailureLink => self.failure_links.len(),
            EntityKind::FailureAnalysis => self.failure_analyses.len(),
            EntityKind::RiskAnalysis => self.risk_analyses.len(),
            EntityKind::Optimization => self.optimizations.len(),
            EntityKind::ConfirmedState => usize::from(self.confirmed.is_some()),
        }
    }

    pub fn record_count(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.len_of(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Kinds that hold at least one record
    pub fn populated_kinds(&self) -> BTreeSet<EntityKind> {
        EntityKind::ALL
            .iter()
            .copied()
            .filter(|k| self.len_of(*k) > 0)
            .collect()
    }

    /// Replace the listed kinds of `self` with those of `other`
    pub fn overlay(&mut self, other: AtomicBatch, kinds: &BTreeSet<EntityKind>) {
        let AtomicBatch {
            fmea_id: _,
            mut l1_structure,
            mut l2_structures,
            mut l3_structures,
            mut l1_functions,
            mut l2_functions,
            mut l3_functions,
            mut failure_effects,
            mut failure_modes,
            mut failure_causes,
            mut failure_links,
            mut failure_analyses,
            mut risk_analyses,
            mut optimizations,
            mut confirmed,
        } = other;

        use std::mem::take;
        for kind in kinds {
            match kind {
                EntityKind::L1Structure => self.l1_structure = l1_structure.take(),
                EntityKind::L2Structure => self.l2_structures = take(&mut l2_structures),
                EntityKind::L3Structure => self.l3_structures = take(&mut l3_structures),
                EntityKind::L1Function => self.l1_functions = take(&mut l1_functions),
                EntityKind::L2Function => self.l2_functions = take(&mut l2_functions),
                EntityKind::L3Function => self.l3_functions = take(&mut l3_functions),
                EntityKind::FailureEffect => self.failure_effects = take(&mut failure_effects),
                EntityKind::FailureMode => self.failure_modes = take(&mut failure_modes),
                EntityKind::FailureCause => self.failure_causes = take(&mut failure_causes),
                EntityKind::FailureLink => self.failure_links = take(&mut failure_links),
                EntityKind::FailureAnalysis => {
                    self.failure_analyses = take(&mut failure_analyses)
                }
                EntityKind::RiskAnalysis => self.risk_analyses = take(&mut risk_analyses),
                EntityKind::Optimization => self.optimizations = take(&mut optimizations),
                EntityKind::ConfirmedState => self.confirmed = confirmed.take(),
            }
        }
    }

    /// Keep only records of `kind` whose ID is in `keep`
    pub fn retain_ids(&mut self, kind: EntityKind, keep: &HashSet<String>) {
        fn retain<T: Record>(records: &mut Vec<T>, keep: &HashSet<String>) {
            records.retain(|r| keep.contains(r.id()));
        }

        match kind {
            EntityKind::L1Structure => {
                if self
                    .l1_structure
                    .as_ref()
                    .is_some_and(|s| !keep.contains(&s.id))
                {
                    self.l1_structure = None;
                }
            }
            EntityKind::L2Structure => retain(&mut self.l2_structures, keep),
            EntityKind::L3Structure => retain(&mut self.l3_structures, keep),
            EntityKind::L1Function => retain(&mut self.l1_functions, keep),
            EntityKind::L2Function => retain(&mut self.l2_functions, keep),
            EntityKind::L3Function => retain(&mut self.l3_functions, keep),
            EntityKind::FailureEffect => retain(&mut self.failure_effects, keep),
            EntityKind::FailureMode => retain(&mut self.failure_modes, keep),
            EntityKind::FailureCause => retain(&mut self.failure_causes, keep),
            EntityKind::FailureLink => retain(&mut self.failure_links, keep),
            EntityKind::FailureAnalysis => retain(&mut self.failure_analyses, keep),
            EntityKind::RiskAnalysis => retain(&mut self.risk_analyses, keep),
            EntityKind::Optimization => retain(&mut self.optimizations, keep),
            EntityKind::ConfirmedState => {
                if self
                    .confirmed
                    .as_ref()
                    .is_some_and(|c| !keep.contains(c.id()))
                {
                    self.confirmed = None;
                }
            }
        }
    }

    /// Reject batches that reuse an ID within one kind
    pub fn check_unique_ids(&self) -> Result<()> {
        let duplicate = [
            (EntityKind::L2Structure, first_duplicate(&self.l2_structures)),
            (EntityKind::L3Structure, first_duplicate(&self.l3_structures)),
            (EntityKind::L1Function, first_duplicate(&self.l1_functions)),
            (EntityKind::L2Function, first_duplicate(&self.l2_functions)),
            (EntityKind::L3Function, first_duplicate(&self.l3_functions)),
            (EntityKind::FailureEffect, first_duplicate(&self.failure_effects)),
            (EntityKind::FailureMode, first_duplicate(&self.failure_modes)),
            (EntityKind::FailureCause, first_duplicate(&self.failure_causes)),
            (EntityKind::FailureLink, first_duplicate(&self.failure_links)),
            (EntityKind::FailureAnalysis, first_duplicate(&self.failure_analyses)),
            (EntityKind::RiskAnalysis, first_duplicate(&self.risk_analyses)),
            (EntityKind::Optimization, first_duplicate(&self.optimizations)),
        ]
        .into_iter()
        .find_map(|(kind, dup)| dup.map(|id| (kind, id.to_string())));

        if let Some((kind, id)) = duplicate {
            return Err(Error::MalformedInput(format!(
                "duplicate {} id '{}' in one batch",
                kind, id
            )));
        }

        if self.l1_structure.iter().any(|s| s.id.trim().is_empty()) {
            return Err(Error::MalformedInput("L1Structure without id".to_string()));
        }

        Ok(())
    }

    /// Index lookups used by migration, flattening and chain resolution
    pub fn l1_function(&self, id: &str) -> Option<&L1Function> {
        self.l1_functions.iter().find(|f| f.id == id)
    }

    pub fn l2_structure(&self, id: &str) -> Option<&L2Structure> {
        self.l2_structures.iter().find(|s| s.id == id)
    }

    pub fn l3_structure(&self, id: &str) -> Option<&L3Structure> {
        self.l3_structures.iter().find(|s| s.id == id)
    }

    pub fn l2_function(&self, id: &str) -> Option<&L2Function> {
        self.l2_functions.iter().find(|f| f.id == id)
    }

    pub fn l3_function(&self, id: &str) -> Option<&L3Function> {
        self.l3_functions.iter().find(|f| f.id == id)
    }

    pub fn failure_effect(&self, id: &str) -> Option<&FailureEffect> {
        self.failure_effects.iter().find(|f| f.id == id)
    }

    pub fn failure_mode(&self, id: &str) -> Option<&FailureMode> {
        self.failure_modes.iter().find(|f| f.id == id)
    }

    pub fn failure_cause(&self, id: &str) -> Option<&FailureCause> {
        self.failure_causes.iter().find(|f| f.id == id)
    }
}

/// Wire form of an atomic save: a kind that is absent is not being replaced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_structure: Option<L1Structure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2_structures: Option<Vec<L2Structure>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l3_structures: Option<Vec<L3Structure>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_functions: Option<Vec<L1Function>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2_functions: Option<Vec<L2Function>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l3_functions: Option<Vec<L3Function>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_effects: Option<Vec<FailureEffect>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_modes: Option<Vec<FailureMode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_causes: Option<Vec<FailureCause>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_links: Option<Vec<FailureLink>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_analyses: Option<Vec<FailureAnalysis>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_analyses: Option<Vec<RiskAnalysis>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizations: Option<Vec<Optimization>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<ConfirmedState>,
}

impl AtomicPayload {
    /// Split into a batch plus the set of kinds the payload carries
    pub fn into_parts(self, fmea_id: &AnalysisKey) -> (AtomicBatch, BTreeSet<EntityKind>) {
        let mut kinds = BTreeSet::new();
        let mut batch = AtomicBatch::new(fmea_id.clone());

        fn take<T>(
            slot: Option<Vec<T>>,
            kind: EntityKind,
            kinds: &mut BTreeSet<EntityKind>,
        ) -> Vec<T> {
            match slot {
                Some(records) => {
                    kinds.insert(kind);
                    records
                }
                None => Vec::new(),
            }
        }

        if self.l1_structure.is_some() {
            kinds.insert(EntityKind::L1Structure);
        }
        batch.l1_structure = self.l1_structure;
        batch.l2_structures = take(self.l2_structures, EntityKind::L2Structure, &mut kinds);
        batch.l3_structures = take(self.l3_structures, EntityKind::L3Structure, &mut kinds);
        batch.l1_functions = take(self.l1_functions, EntityKind::L1Function, &mut kinds);
        batch.l2_functions = take(self.l2_functions, EntityKind::L2Function, &mut kinds);
        batch.l3_functions = take(self.l3_functions, EntityKind::L3Function, &mut kinds);
        batch.failure_effects = take(self.failure_effects, EntityKind::FailureEffect, &mut kinds);
        batch.failure_modes = take(self.failure_modes, EntityKind::FailureMode, &mut kinds);
        batch.failure_causes = take(self.failure_causes, EntityKind::FailureCause, &mut kinds);
        batch.failure_links = take(self.failure_links, EntityKind::FailureLink, &mut kinds);
        batch.failure_analyses =
            take(self.failure_analyses, EntityKind::FailureAnalysis, &mut kinds);
        batch.risk_analyses = take(self.risk_analyses, EntityKind::RiskAnalysis, &mut kinds);
        batch.optimizations = take(self.optimizations, EntityKind::Optimization, &mut kinds);
        if self.confirmed.is_some() {
            kinds.insert(EntityKind::ConfirmedState);
        }
        batch.confirmed = self.confirmed;

        (batch, kinds)
    }

    pub fn is_empty(&self) -> bool {
        *self == AtomicPayload::default()
    }
}

impl From<AtomicBatch> for AtomicPayload {
    fn from(batch: AtomicBatch) -> Self {
        Self {
            l1_structure: batch.l1_structure,
            l2_structures: Some(batch.l2_structures),
            l3_structures: Some(batch.l3_structures),
            l1_functions: Some(batch.l1_functions),
            l2_functions: Some(batch.l2_functions),
            l3_functions: Some(batch.l3_functions),
            failure_effects: Some(batch.failure_effects),
            failure_modes: Some(batch.failure_modes),
            failure_causes: Some(batch.failure_causes),
            failure_links: Some(batch.failure_links),
            failure_analyses: Some(batch.failure_analyses),
            risk_analyses: Some(batch.risk_analyses),
            optimizations: Some(batch.optimizations),
            confirmed: batch.confirmed,
        }
    }
}
