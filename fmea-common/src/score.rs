//! Completeness scoring and the overwrite guard
//!
//! The score is a coarse "how much has been filled in" number for a legacy
//! snapshot. It exists only so a save that would replace a rich analysis with
//! a nearly empty one can be stopped and reported instead of committed.

use serde::{Deserialize, Serialize};

use crate::model::LegacyDocument;

/// Per-item score weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Top-level name present
    pub top_level_name: u64,
    /// Each process step with a name or number
    pub process_step: u64,
    /// Each work element
    pub work_element: u64,
    /// Each failure mode, failure cause and failure-effect scope
    pub failure_record: u64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            top_level_name: 50,
            process_step: 20,
            work_element: 5,
            failure_record: 2,
        }
    }
}

/// Score a snapshot; a missing snapshot scores 0
pub fn completeness_score(doc: Option<&LegacyDocument>, weights: &ScoreWeights) -> u64 {
    let Some(doc) = doc else {
        return 0;
    };

    let mut score = 0;
    if !doc.l1.name.trim().is_empty() {
        score += weights.top_level_name;
    }

    for process in &doc.l2 {
        if !process.name.trim().is_empty() || !process.no.trim().is_empty() {
            score += weights.process_step;
        }
        score += weights.work_element * process.l3.len() as u64;
        let failures = process.failure_modes.len() + process.failure_causes.len();
        score += weights.failure_record * failures as u64;
    }

    score += weights.failure_record * doc.l1.failure_scopes.len() as u64;
    score
}

/// Number of populated leaf records in a snapshot
///
/// Leaves are work elements, requirements, product and process
/// characteristics, failure modes, failure causes and failure-effect scopes.
pub fn leaf_count(doc: Option<&LegacyDocument>) -> usize {
    let Some(doc) = doc else {
        return 0;
    };

    let requirements: usize = doc
        .l1
        .types
        .iter()
        .flat_map(|t| &t.functions)
        .map(|f| f.requirements.len())
        .sum();

    let per_process: usize = doc
        .l2
        .iter()
        .map(|p| {
            let product_chars: usize = p.functions.iter().map(|f| f.product_chars.len()).sum();
            let process_chars: usize = p
                .l3
                .iter()
                .flat_map(|we| &we.functions)
                .map(|f| f.process_chars.len())
                .sum();
            p.l3.len() + product_chars + process_chars + p.failure_modes.len() + p.failure_causes.len()
        })
        .sum();

    requirements + per_process + doc.l1.failure_scopes.len()
}

/// Score and leaf count of one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetrics {
    pub score: u64,
    pub leaves: usize,
}

/// Which guard check fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardRule {
    /// Incoming scores 0 over a substantial existing analysis
    EmptyOverRich,
    /// Incoming has no leaves while the existing one has some
    NoLeavesOverLeaves,
    /// Incoming scores lower and sits at or below the low-score ceiling
    SharpScoreDrop,
}

impl GuardRule {
    pub fn describe(self) -> &'static str {
        match self {
            GuardRule::EmptyOverRich => "incoming snapshot is empty while stored analysis is populated",
            GuardRule::NoLeavesOverLeaves => "incoming snapshot has no leaf records while stored analysis has some",
            GuardRule::SharpScoreDrop => "incoming snapshot scores far below the stored analysis",
        }
    }
}

/// Result of comparing an incoming snapshot against the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardVerdict {
    pub incoming_score: u64,
    pub existing_score: u64,
    pub incoming_leaves: usize,
    pub existing_leaves: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<GuardRule>,
}

impl GuardVerdict {
    /// True when the save looks like an accidental wipe
    pub fn is_wipe(&self) -> bool {
        self.rule.is_some()
    }
}

/// Guard thresholds, loaded from the `[guard]` config section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardPolicy {
    /// An empty incoming snapshot is a wipe when the stored score is at least this
    pub wipe_existing_min_score: u64,
    /// A lower incoming score is a wipe when it is at or below this
    pub low_score_ceiling: u64,
    pub weights: ScoreWeights,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            wipe_existing_min_score: 50,
            low_score_ceiling: 20,
            weights: ScoreWeights::default(),
        }
    }
}

impl GuardPolicy {
    pub fn measure(&self, doc: Option<&LegacyDocument>) -> SnapshotMetrics {
        SnapshotMetrics {
            score: completeness_score(doc, &self.weights),
            leaves: leaf_count(doc),
        }
    }

    /// Apply the checks in order; the first that matches decides
    pub fn evaluate(&self, incoming: SnapshotMetrics, existing: SnapshotMetrics) -> GuardVerdict {
        let rule = if incoming.score == 0 && existing.score >= self.wipe_existing_min_score {
            Some(GuardRule::EmptyOverRich)
        } else if incoming.leaves == 0 && existing.leaves > 0 {
            Some(GuardRule::NoLeavesOverLeaves)
        } else if incoming.score < existing.score && incoming.score <= self.low_score_ceiling {
            Some(GuardRule::SharpScoreDrop)
        } else {
            None
        };

        GuardVerdict {
            incoming_score: incoming.score,
            existing_score: existing.score,
            incoming_leaves: incoming.leaves,
            existing_leaves: existing.leaves,
            rule,
        }
    }

    pub fn compare(
        &self,
        incoming: Option<&LegacyDocument>,
        existing: Option<&LegacyDocument>,
    ) -> GuardVerdict {
        self.evaluate(self.measure(incoming), self.measure(existing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::legacy::{LegacyFailureMode, LegacyProcess, LegacyWorkElement};

    fn process(name: &str, elements: usize, modes: usize) -> LegacyProcess {
        LegacyProcess {
            name: name.to_string(),
            l3: (0..elements)
                .map(|i| LegacyWorkElement {
                    name: format!("WE {}", i),
                    ..Default::default()
                })
                .collect(),
            failure_modes: (0..modes)
                .map(|i| LegacyFailureMode {
                    name: format!("Mode {}", i),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_score_weights() {
        let mut doc = LegacyDocument::default();
        doc.l1.name = "Brake Caliper".into();
        doc.l2.push(process("Machining", 2, 3));
        doc.l2.push(process("", 0, 0));

        // 50 + 20 + 2*5 + 3*2
        assert_eq!(completeness_score(Some(&doc), &ScoreWeights::default()), 86);
        assert_eq!(leaf_count(Some(&doc)), 5);
        assert_eq!(completeness_score(None, &ScoreWeights::default()), 0);
    }

    #[test]
    fn test_empty_over_rich_is_wipe() {
        let policy = GuardPolicy::default();
        let verdict = policy.evaluate(
            SnapshotMetrics { score: 0, leaves: 0 },
            SnapshotMetrics { score: 70, leaves: 1 },
        );
        assert_eq!(verdict.rule, Some(GuardRule::EmptyOverRich));
        assert_eq!(verdict.incoming_score, 0);
        assert_eq!(verdict.existing_score, 70);
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        let policy = GuardPolicy::default();

        let v = policy.evaluate(
            SnapshotMetrics { score: 70, leaves: 0 },
            SnapshotMetrics { score: 70, leaves: 4 },
        );
        assert_eq!(v.rule, Some(GuardRule::NoLeavesOverLeaves));

        let v = policy.evaluate(
            SnapshotMetrics { score: 20, leaves: 1 },
            SnapshotMetrics { score: 90, leaves: 6 },
        );
        assert_eq!(v.rule, Some(GuardRule::SharpScoreDrop));

        let v = policy.evaluate(
            SnapshotMetrics { score: 21, leaves: 1 },
            SnapshotMetrics { score: 90, leaves: 6 },
        );
        assert!(!v.is_wipe());
    }

    #[test]
    fn test_first_save_never_wipes() {
        let policy = GuardPolicy::default();
        let v = policy.compare(Some(&LegacyDocument::default()), None);
        assert!(!v.is_wipe());
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let incoming = SnapshotMetrics { score: 40, leaves: 2 };
        let existing = SnapshotMetrics { score: 90, leaves: 6 };
        assert!(!GuardPolicy::default().evaluate(incoming, existing).is_wipe());

        let strict = GuardPolicy {
            low_score_ceiling: 40,
            ..Default::default()
        };
        assert_eq!(
            strict.evaluate(incoming, existing).rule,
            Some(GuardRule::SharpScoreDrop)
        );
    }
}
