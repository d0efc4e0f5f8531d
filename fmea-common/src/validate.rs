//! Foreign-key validation of a candidate batch
//!
//! Kinds are processed parents-first, so by the time a kind is checked every
//! kind it can reference has its accepted-key set finalized. A rejected record
//! is dropped from the batch and reported; the rest of the batch stays.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

use crate::model::{AnalysisKey, AtomicBatch, EntityKind, FailureLink, Record};

/// IDs accepted so far in one transaction, per kind
#[derive(Debug, Clone, Default)]
pub struct AcceptedKeys {
    keys: HashMap<EntityKind, HashSet<String>>,
}

impl AcceptedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load IDs of a kind that this save leaves untouched in storage
    pub fn seed<I>(&mut self, kind: EntityKind, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.keys.entry(kind).or_default().extend(ids);
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.keys.get(&kind).is_some_and(|set| set.contains(id))
    }

    pub fn ids(&self, kind: EntityKind) -> Option<&HashSet<String>> {
        self.keys.get(&kind)
    }

    fn insert(&mut self, kind: EntityKind, id: &str) {
        self.keys.entry(kind).or_default().insert(id.to_string());
    }
}

/// Why a record was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RejectReason {
    /// Record has no ID
    MissingId,
    /// Listed FK fields do not resolve to an accepted record
    MissingForeignKey { fields: Vec<String> },
    /// Record carries another analysis' key
    ForeignAnalysis { found: AnalysisKey },
    /// Same FM/FE/FC triple as an earlier link
    DuplicateLink { kept: String },
}

/// One dropped record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub kind: EntityKind,
    pub id: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub rejections: Vec<Rejection>,
    /// Accepted record count per kind (kinds with records only)
    pub accepted: BTreeMap<EntityKind, usize>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }

    pub fn rejected_ids(&self, kind: EntityKind) -> Vec<&str> {
        self.rejections
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.id.as_str())
            .collect()
    }
}

fn check_record<T: Record>(
    record: &T,
    key: &AnalysisKey,
    accepted: &AcceptedKeys,
) -> Option<RejectReason> {
    if record.id().trim().is_empty() {
        return Some(RejectReason::MissingId);
    }
    if record.fmea_id() != key {
        return Some(RejectReason::ForeignAnalysis {
            found: record.fmea_id().clone(),
        });
    }

    let fields: Vec<String> = record
        .foreign_keys()
        .into_iter()
        .filter(|fk| !accepted.contains(fk.target, fk.value))
        .map(|fk| fk.field.to_string())
        .collect();

    if fields.is_empty() {
        None
    } else {
        Some(RejectReason::MissingForeignKey { fields })
    }
}

fn validate_records<T: Record>(
    records: &mut Vec<T>,
    key: &AnalysisKey,
    accepted: &mut AcceptedKeys,
    rejections: &mut Vec<Rejection>,
) {
    records.retain(|record| match check_record(record, key, accepted) {
        Some(reason) => {
            rejections.push(Rejection {
                kind: T::KIND,
                id: record.id().to_string(),
                reason,
            });
            false
        }
        None => {
            accepted.insert(T::KIND, record.id());
            true
        }
    });
}

fn validate_single<T: Record>(
    slot: &mut Option<T>,
    key: &AnalysisKey,
    accepted: &mut AcceptedKeys,
    rejections: &mut Vec<Rejection>,
) {
    let mut records: Vec<T> = slot.take().into_iter().collect();
    validate_records(&mut records, key, accepted, rejections);
    *slot = records.pop();
}

/// Validate links, keeping the first accepted link of every FM/FE/FC triple
///
/// A link rejected for its keys never claims the triple, so a valid twin
/// later in the list survives.
fn validate_links(
    links: &mut Vec<FailureLink>,
    key: &AnalysisKey,
    accepted: &mut AcceptedKeys,
    rejections: &mut Vec<Rejection>,
) {
    let mut first_by_triple: HashMap<(String, String, String), String> = HashMap::new();
    links.retain(|link| {
        let reason = check_record(link, key, accepted).or_else(|| {
            let triple = (link.fm_id.clone(), link.fe_id.clone(), link.fc_id.clone());
            match first_by_triple.get(&triple) {
                Some(kept) => Some(RejectReason::DuplicateLink { kept: kept.clone() }),
                None => {
                    first_by_triple.insert(triple, link.id.clone());
                    None
                }
            }
        });

        match reason {
            Some(reason) => {
                rejections.push(Rejection {
                    kind: EntityKind::FailureLink,
                    id: link.id.clone(),
                    reason,
                });
                false
            }
            None => {
                accepted.insert(EntityKind::FailureLink, &link.id);
                true
            }
        }
    });
}

/// Drop every record whose foreign keys do not resolve, in dependency order
///
/// `seeds` supplies accepted IDs for kinds the save does not replace. Seed
/// only those kinds: a replaced kind must resolve against the batch alone.
pub fn validate_batch(batch: &mut AtomicBatch, seeds: &AcceptedKeys) -> ValidationReport {
    let key = batch.fmea_id.clone();
    let mut accepted = seeds.clone();
    let mut rejections = Vec::new();

    for kind in EntityKind::ALL {
        let (acc, rej) = (&mut accepted, &mut rejections);
        match kind {
            EntityKind::L1Structure => validate_single(&mut batch.l1_structure, &key, acc, rej),
            EntityKind::L2Structure => validate_records(&mut batch.l2_structures, &key, acc, rej),
            EntityKind::L3Structure => validate_records(&mut batch.l3_structures, &key, acc, rej),
            EntityKind::L1Function => validate_records(&mut batch.l1_functions, &key, acc, rej),
            EntityKind::L2Function => validate_records(&mut batch.l2_functions, &key, acc, rej),
            EntityKind::L3Function => validate_records(&mut batch.l3_functions, &key, acc, rej),
            EntityKind::FailureEffect => {
                validate_records(&mut batch.failure_effects, &key, acc, rej)
            }
            EntityKind::FailureMode => validate_records(&mut batch.failure_modes, &key, acc, rej),
            EntityKind::FailureCause => validate_records(&mut batch.failure_causes, &key, acc, rej),
            EntityKind::FailureLink => validate_links(&mut batch.failure_links, &key, acc, rej),
            EntityKind::FailureAnalysis => {
                validate_records(&mut batch.failure_analyses, &key, acc, rej)
            }
            EntityKind::RiskAnalysis => validate_records(&mut batch.risk_analyses, &key, acc, rej),
            EntityKind::Optimization => validate_records(&mut batch.optimizations, &key, acc, rej),
            EntityKind::ConfirmedState => validate_single(&mut batch.confirmed, &key, acc, rej),
        }
    }

    for rejection in &rejections {
        warn!(
            fmea_id = %key,
            kind = %rejection.kind,
            id = %rejection.id,
            reason = ?rejection.reason,
            "Dropped record during validation"
        );
    }

    let accepted = EntityKind::ALL
        .iter()
        .map(|k| (*k, batch.len_of(*k)))
        .filter(|(_, n)| *n > 0)
        .collect();

    ValidationReport {
        rejections,
        accepted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FailureCause, FailureEffect, FailureMode, L1Category, L1Function, L1Structure};

    fn key() -> AnalysisKey {
        AnalysisKey::parse("PFM-V").unwrap()
    }

    fn batch_with_chain() -> AtomicBatch {
        let mut b = AtomicBatch::new(key());
        b.l1_structure = Some(L1Structure {
            id: "L1-1".into(),
            fmea_id: key(),
            name: "Brake Caliper".into(),
            confirmed: false,
        });
        b.l1_functions.push(L1Function {
            id: "REQ-1".into(),
            fmea_id: key(),
            l1_struct_id: "L1-1".into(),
            category: L1Category::User,
            function_name: "Stop vehicle".into(),
            requirement: "Clamp force".into(),
        });
        b.failure_effects.push(FailureEffect {
            id: "FE-1".into(),
            fmea_id: key(),
            l1_func_id: "REQ-1".into(),
            category: L1Category::User,
            effect: "Stop Function Loss".into(),
            severity: None,
        });
        b
    }

    #[test]
    fn test_orphan_effect_is_dropped_and_reported() {
        let mut batch = batch_with_chain();
        batch.failure_effects.push(FailureEffect {
            id: "FE-ORPHAN".into(),
            fmea_id: key(),
            l1_func_id: "REQ-MISSING".into(),
            category: L1Category::User,
            effect: "Noise".into(),
            severity: None,
        });

        let report = validate_batch(&mut batch, &AcceptedKeys::new());

        assert_eq!(batch.ids_of(EntityKind::FailureEffect), vec!["FE-1".to_string()]);
        assert_eq!(
            report.rejections,
            vec![Rejection {
                kind: EntityKind::FailureEffect,
                id: "FE-ORPHAN".into(),
                reason: RejectReason::MissingForeignKey {
                    fields: vec!["l1FuncId".into()]
                },
            }]
        );
        assert_eq!(report.accepted.get(&EntityKind::L1Function), Some(&1));
    }

    #[test]
    fn test_rejection_cascades_to_children() {
        let mut batch = batch_with_chain();
        batch.l1_structure = None;

        let report = validate_batch(&mut batch, &AcceptedKeys::new());

        assert!(batch.l1_functions.is_empty());
        assert!(batch.failure_effects.is_empty());
        assert_eq!(report.rejections.len(), 2);
    }

    #[test]
    fn test_seeded_kinds_resolve() {
        let mut batch = AtomicBatch::new(key());
        batch.failure_links.push(FailureLink {
            id: "LK-1".into(),
            fmea_id: key(),
            fm_id: "FM-1".into(),
            fe_id: "FE-1".into(),
            fc_id: "FC-1".into(),
        });

        let mut seeds = AcceptedKeys::new();
        seeds.seed(EntityKind::FailureMode, ["FM-1".to_string()]);
        seeds.seed(EntityKind::FailureEffect, ["FE-1".to_string()]);

        let report = validate_batch(&mut batch, &seeds);
        assert_eq!(report.rejected_ids(EntityKind::FailureLink), vec!["LK-1"]);
        assert_eq!(
            report.rejections[0].reason,
            RejectReason::MissingForeignKey {
                fields: vec!["fcId".into()]
            }
        );

        seeds.seed(EntityKind::FailureCause, ["FC-1".to_string()]);
        let mut batch = AtomicBatch::new(key());
        batch.failure_links.push(FailureLink {
            id: "LK-1".into(),
            fmea_id: key(),
            fm_id: "FM-1".into(),
            fe_id: "FE-1".into(),
            fc_id: "FC-1".into(),
        });
        assert!(validate_batch(&mut batch, &seeds).is_clean());
    }

    #[test]
    fn test_duplicate_triple_keeps_first() {
        let mut batch = AtomicBatch::new(key());
        batch.failure_modes.push(FailureMode {
            id: "FM-1".into(),
            fmea_id: key(),
            l2_func_id: "PC-1".into(),
            l2_struct_id: "P-1".into(),
            mode: "Crack".into(),
            special_char: false,
        });
        batch.failure_causes.push(FailureCause {
            id: "FC-1".into(),
            fmea_id: key(),
            l3_func_id: "PR-1".into(),
            l3_struct_id: "WE-1".into(),
            l2_struct_id: "P-1".into(),
            cause: "Tool Wear".into(),
            occurrence: None,
        });
        for id in ["LK-A", "LK-B"] {
            batch.failure_links.push(FailureLink {
                id: id.into(),
                fmea_id: key(),
                fm_id: "FM-1".into(),
                fe_id: "FE-1".into(),
                fc_id: "FC-1".into(),
            });
        }

        let mut seeds = AcceptedKeys::new();
        for (kind, id) in [
            (EntityKind::L2Structure, "P-1"),
            (EntityKind::L3Structure, "WE-1"),
            (EntityKind::L2Function, "PC-1"),
            (EntityKind::L3Function, "PR-1"),
            (EntityKind::FailureEffect, "FE-1"),
        ] {
            seeds.seed(kind, [id.to_string()]);
        }

        let report = validate_batch(&mut batch, &seeds);
        assert_eq!(batch.ids_of(EntityKind::FailureLink), vec!["LK-A".to_string()]);
        assert_eq!(
            report.rejections,
            vec![Rejection {
                kind: EntityKind::FailureLink,
                id: "LK-B".into(),
                reason: RejectReason::DuplicateLink { kept: "LK-A".into() },
            }]
        );
    }

    #[test]
    fn test_rejected_link_does_not_claim_its_triple() {
        let mut batch = AtomicBatch::new(key());
        for id in ["LK-A", "LK-B"] {
            batch.failure_links.push(FailureLink {
                id: id.into(),
                fmea_id: key(),
                fm_id: "FM-1".into(),
                fe_id: "FE-1".into(),
                fc_id: "FC-1".into(),
            });
        }
        batch.failure_links[0].fmea_id = AnalysisKey::parse("OTHER").unwrap();

        let mut seeds = AcceptedKeys::new();
        seeds.seed(EntityKind::FailureMode, ["FM-1".to_string()]);
        seeds.seed(EntityKind::FailureEffect, ["FE-1".to_string()]);
        seeds.seed(EntityKind::FailureCause, ["FC-1".to_string()]);

        let report = validate_batch(&mut batch, &seeds);
        assert_eq!(batch.ids_of(EntityKind::FailureLink), vec!["LK-B".to_string()]);
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].id, "LK-A");
        assert!(matches!(
            report.rejections[0].reason,
            RejectReason::ForeignAnalysis { .. }
        ));
    }

    #[test]
    fn test_cross_analysis_record_is_rejected() {
        let mut batch = batch_with_chain();
        batch.failure_effects[0].fmea_id = AnalysisKey::parse("OTHER").unwrap();

        let report = validate_batch(&mut batch, &AcceptedKeys::new());
        assert!(matches!(
            report.rejections[0].reason,
            RejectReason::ForeignAnalysis { .. }
        ));
    }
}
