//! Legacy tree ⇄ atomic records
//!
//! Node IDs cross the boundary unchanged. A child's foreign key is its legacy
//! parent's ID, which is what keeps failure records attached to the right
//! parent after a round trip:
//!
//! | Atomic record | ID taken from | Children point at it via |
//! |---|---|---|
//! | L1Function | requirement (else function, else type) | FailureEffect.l1FuncId |
//! | L2Function | product characteristic (else function) | FailureMode.l2FuncId |
//! | L3Function | process characteristic (else function) | FailureCause.l3FuncId |
//!
//! Two leaves with the same parent path and the same text become one atomic
//! record. That step is lossy on purpose and is reported as a
//! [`MigrationWarning::DuplicateMerged`].

pub mod to_atomic;
pub mod to_legacy;

pub use to_atomic::to_atomic;
pub use to_legacy::to_legacy;

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::model::{EntityKind, LegacyDocument};

/// Something migration had to guess at or drop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MigrationWarning {
    /// Declared parent ID did not resolve; matched by parent text instead
    ParentResolvedByText {
        kind: EntityKind,
        id: String,
        declared: Option<String>,
        parent: String,
    },
    /// Neither ID nor text resolved; attached to the first candidate parent
    ParentFellBackToFirst {
        kind: EntityKind,
        id: String,
        declared: Option<String>,
        parent: String,
    },
    /// No candidate parent at all; emitted unattached for the validator to report
    ParentUnresolved {
        kind: EntityKind,
        id: String,
        declared: Option<String>,
    },
    /// Same parent path and text as an earlier leaf
    DuplicateMerged {
        kind: EntityKind,
        dropped: String,
        kept: String,
    },
    /// Link lacking one of FM/FE/FC
    DraftLinkSkipped { id: String, missing: Vec<String> },
}

impl fmt::Display for MigrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationWarning::ParentResolvedByText {
                kind,
                id,
                declared,
                parent,
            } => write!(
                f,
                "{} {}: parent {:?} not found, matched {} by text",
                kind, id, declared, parent
            ),
            MigrationWarning::ParentFellBackToFirst {
                kind,
                id,
                declared,
                parent,
            } => write!(
                f,
                "{} {}: parent {:?} not found, attached to first candidate {}",
                kind, id, declared, parent
            ),
            MigrationWarning::ParentUnresolved { kind, id, declared } => write!(
                f,
                "{} {}: parent {:?} not found and no candidate available",
                kind, id, declared
            ),
            MigrationWarning::DuplicateMerged {
                kind,
                dropped,
                kept,
            } => write!(f, "{} {} merged into identical {}", kind, dropped, kept),
            MigrationWarning::DraftLinkSkipped { id, missing } => {
                write!(f, "draft link {} skipped, missing {}", id, missing.join(", "))
            }
        }
    }
}

/// Migration result plus every fallback taken to produce it
#[derive(Debug, Clone)]
pub struct Migrated<T> {
    pub value: T,
    pub warnings: Vec<MigrationWarning>,
}

/// Kinds a legacy snapshot is authoritative for
///
/// Risk and optimization rows are only replaced when the snapshot carries a
/// `risks` list; an absent list leaves stored risk work alone.
pub fn legacy_kinds(doc: &LegacyDocument) -> BTreeSet<EntityKind> {
    EntityKind::ALL
        .iter()
        .copied()
        .filter(|kind| {
            doc.risks.is_some()
                || !matches!(kind, EntityKind::RiskAnalysis | EntityKind::Optimization)
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_kinds_respect_missing_risks() {
        let mut doc = LegacyDocument::default();
        let kinds = legacy_kinds(&doc);
        assert!(kinds.contains(&EntityKind::FailureLink));
        assert!(!kinds.contains(&EntityKind::RiskAnalysis));

        doc.risks = Some(vec![]);
        assert!(legacy_kinds(&doc).contains(&EntityKind::Optimization));
    }

    #[test]
    fn test_warning_display() {
        let w = MigrationWarning::DraftLinkSkipped {
            id: "LK-9".into(),
            missing: vec!["fcId".into()],
        };
        assert_eq!(w.to_string(), "draft link LK-9 skipped, missing fcId");
    }
}
