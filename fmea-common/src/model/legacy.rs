//! Legacy nested-tree document
//!
//! Mirrors the worksheet hierarchy: product (L1) → process steps (L2) → work
//! elements (L3) → functions → characteristics → failure records. Node IDs in
//! this tree are the same IDs the atomic records use.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::entities::{ConfirmedState, FourM, L1Category, OptimizationStatus};
use super::{ActionPriority, AnalysisKey, EntityKind, Rating};
use crate::ids::IdMinter;

/// Whole-analysis legacy snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDocument {
    #[serde(default)]
    pub l1: LegacyL1,
    #[serde(default)]
    pub l2: Vec<LegacyProcess>,
    #[serde(default)]
    pub failure_links: Vec<LegacyFailureLink>,
    /// `None` means the snapshot carries no risk/optimization content at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<LegacyRisk>>,

    #[serde(default)]
    pub structure_confirmed: bool,
    #[serde(default)]
    pub l1_confirmed: bool,
    #[serde(default)]
    pub l2_confirmed: bool,
    #[serde(default)]
    pub l3_confirmed: bool,
    #[serde(default)]
    pub failure_l1_confirmed: bool,
    #[serde(default)]
    pub failure_l2_confirmed: bool,
    #[serde(default)]
    pub failure_l3_confirmed: bool,
    #[serde(default)]
    pub failure_link_confirmed: bool,
    #[serde(default)]
    pub risk_confirmed: bool,
    #[serde(default)]
    pub optimization_confirmed: bool,

    /// Registration-only fields; kept across worksheet-only saves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Vec<TeamMember>>,

    /// Unknown top-level fields, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub responsible: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub revision_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub department: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyL1 {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub types: Vec<LegacyL1Type>,
    #[serde(default)]
    pub failure_scopes: Vec<LegacyFailureScope>,
}

/// Category bucket: type → function → requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyL1Type {
    #[serde(default)]
    pub id: String,
    pub name: L1Category,
    #[serde(default)]
    pub functions: Vec<LegacyL1Function>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyL1Function {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub requirements: Vec<LegacyNamed>,
}

/// Leaf holding only an ID and text (requirements)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyNamed {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Failure effect recorded against an L1 requirement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFailureScope {
    #[serde(default)]
    pub id: String,
    /// Declared parent requirement; may drift out of date
    #[serde(default)]
    pub req_id: Option<String>,
    /// Requirement text, used when `req_id` no longer resolves
    #[serde(default)]
    pub requirement: String,
    #[serde(default)]
    pub scope: Option<L1Category>,
    #[serde(default)]
    pub effect: String,
    #[serde(default)]
    pub severity: Option<Rating>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProcess {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub no: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub functions: Vec<LegacyL2Function>,
    #[serde(default)]
    pub l3: Vec<LegacyWorkElement>,
    #[serde(default)]
    pub failure_modes: Vec<LegacyFailureMode>,
    #[serde(default)]
    pub failure_causes: Vec<LegacyFailureCause>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyL2Function {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_chars: Vec<LegacyCharacteristic>,
}

/// Product or process characteristic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCharacteristic {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub special_char: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyWorkElement {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub m4: Option<FourM>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub functions: Vec<LegacyL3Function>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyL3Function {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub process_chars: Vec<LegacyCharacteristic>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFailureMode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sc: bool,
    #[serde(default)]
    pub product_char_id: Option<String>,
    #[serde(default)]
    pub product_char: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFailureCause {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub occurrence: Option<Rating>,
    #[serde(default)]
    pub process_char_id: Option<String>,
    #[serde(default)]
    pub process_char: Option<String>,
}

/// Link row as held by the worksheet; drafts may lack one of the three ends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFailureLink {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub fm_id: Option<String>,
    #[serde(default)]
    pub fe_id: Option<String>,
    #[serde(default)]
    pub fc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fm_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fe_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fc_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Rating>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRisk {
    #[serde(default)]
    pub id: String,
    pub link_id: String,
    #[serde(default)]
    pub severity: Option<Rating>,
    #[serde(default)]
    pub occurrence: Option<Rating>,
    #[serde(default)]
    pub detection: Option<Rating>,
    #[serde(default)]
    pub ap: Option<ActionPriority>,
    #[serde(default)]
    pub prevention_control: String,
    #[serde(default)]
    pub detection_control: String,
    #[serde(default)]
    pub optimization: Option<LegacyOptimization>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOptimization {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub recommended_action: String,
    #[serde(default)]
    pub responsible: String,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub new_severity: Option<Rating>,
    #[serde(default)]
    pub new_occurrence: Option<Rating>,
    #[serde(default)]
    pub new_detection: Option<Rating>,
    #[serde(default)]
    pub status: OptimizationStatus,
    #[serde(default)]
    pub remarks: String,
}

/// Fills missing IDs, seeding each from its parent ID and text
///
/// Siblings with the same text under one parent are told apart by ordinal.
struct Stamper<'a> {
    ids: &'a mut IdMinter,
    seen: HashMap<(EntityKind, String, String), usize>,
}

impl<'a> Stamper<'a> {
    fn new(ids: &'a mut IdMinter) -> Self {
        Self {
            ids,
            seen: HashMap::new(),
        }
    }

    fn stamp(&mut self, id: &mut String, kind: EntityKind, parent: &str, text: &str) {
        let text = text.trim().to_string();
        let ordinal = self
            .seen
            .entry((kind, parent.to_string(), text.clone()))
            .or_insert(0);
        let seed = format!("{}/{}#{}", parent, text, ordinal);
        *ordinal += 1;

        if id.trim().is_empty() {
            *id = self.ids.mint_for(kind, &seed);
        }
    }
}

impl LegacyDocument {
    /// Write an ID into every node that lacks one
    ///
    /// Run before `to_atomic` when the snapshot will also be stored, so the
    /// stored tree and the atomic rows agree. With a derived minter the same
    /// tree gets the same IDs on every save.
    pub fn assign_missing_ids(&mut self, ids: &mut IdMinter) {
        let mut s = Stamper::new(ids);

        s.stamp(&mut self.l1.id, EntityKind::L1Structure, "", &self.l1.name);
        let l1_id = self.l1.id.clone();
        for ty in &mut self.l1.types {
            s.stamp(&mut ty.id, EntityKind::L1Function, &l1_id, ty.name.code());
            for func in &mut ty.functions {
                s.stamp(&mut func.id, EntityKind::L1Function, &ty.id, &func.name);
                for req in &mut func.requirements {
                    s.stamp(&mut req.id, EntityKind::L1Function, &func.id, &req.name);
                }
            }
        }
        for scope in &mut self.l1.failure_scopes {
            let text = format!("{}:{}", scope.req_id.as_deref().unwrap_or(""), scope.effect);
            s.stamp(&mut scope.id, EntityKind::FailureEffect, &l1_id, &text);
        }

        for process in &mut self.l2 {
            let text = format!("{}:{}", process.no, process.name);
            s.stamp(&mut process.id, EntityKind::L2Structure, &l1_id, &text);
            for func in &mut process.functions {
                s.stamp(&mut func.id, EntityKind::L2Function, &process.id, &func.name);
                for ch in &mut func.product_chars {
                    s.stamp(&mut ch.id, EntityKind::L2Function, &func.id, &ch.name);
                }
            }
            for we in &mut process.l3 {
                s.stamp(&mut we.id, EntityKind::L3Structure, &process.id, &we.name);
                for func in &mut we.functions {
                    s.stamp(&mut func.id, EntityKind::L3Function, &we.id, &func.name);
                    for ch in &mut func.process_chars {
                        s.stamp(&mut ch.id, EntityKind::L3Function, &func.id, &ch.name);
                    }
                }
            }
            for fm in &mut process.failure_modes {
                s.stamp(&mut fm.id, EntityKind::FailureMode, &process.id, &fm.name);
            }
            for fc in &mut process.failure_causes {
                s.stamp(&mut fc.id, EntityKind::FailureCause, &process.id, &fc.name);
            }
        }

        for link in &mut self.failure_links {
            let end = |id: &Option<String>, text: &Option<String>| {
                id.as_deref().or(text.as_deref()).unwrap_or("").to_string()
            };
            let text = format!(
                "{}|{}|{}",
                end(&link.fm_id, &link.fm_text),
                end(&link.fe_id, &link.fe_text),
                end(&link.fc_id, &link.fc_text)
            );
            s.stamp(&mut link.id, EntityKind::FailureLink, &l1_id, &text);
        }
        for risk in self.risks.iter_mut().flatten() {
            s.stamp(&mut risk.id, EntityKind::RiskAnalysis, &l1_id, &risk.link_id);
            if let Some(opt) = risk.optimization.as_mut() {
                s.stamp(
                    &mut opt.id,
                    EntityKind::Optimization,
                    &risk.id,
                    &opt.recommended_action,
                );
            }
        }
    }

    /// Keep registration fields from `existing` that this snapshot does not send
    ///
    /// Shallow, per top-level field: incoming wins if present.
    pub fn merge_registration(&mut self, existing: &LegacyDocument) {
        if self.project.is_none() {
            self.project = existing.project.clone();
        }
        if self.team.is_none() {
            self.team = existing.team.clone();
        }
        for (field, value) in &existing.extra {
            self.extra
                .entry(field.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn confirmed_state(&self, fmea_id: &AnalysisKey) -> ConfirmedState {
        ConfirmedState {
            fmea_id: fmea_id.clone(),
            structure: self.structure_confirmed,
            l1_function: self.l1_confirmed,
            l2_function: self.l2_confirmed,
            l3_function: self.l3_confirmed,
            failure_l1: self.failure_l1_confirmed,
            failure_l2: self.failure_l2_confirmed,
            failure_l3: self.failure_l3_confirmed,
            failure_link: self.failure_link_confirmed,
            risk: self.risk_confirmed,
            optimization: self.optimization_confirmed,
        }
    }

    pub fn apply_confirmed_state(&mut self, state: &ConfirmedState) {
        self.structure_confirmed = state.structure;
        self.l1_confirmed = state.l1_function;
        self.l2_confirmed = state.l2_function;
        self.l3_confirmed = state.l3_function;
        self.failure_l1_confirmed = state.failure_l1;
        self.failure_l2_confirmed = state.failure_l2;
        self.failure_l3_confirmed = state.failure_l3;
        self.failure_link_confirmed = state.failure_link;
        self.risk_confirmed = state.risk;
        self.optimization_confirmed = state.optimization;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let doc: LegacyDocument = serde_json::from_value(json!({
            "l1": { "id": "L1-A", "name": "Brake Caliper" },
            "l2": [],
            "structureConfirmed": true,
            "layoutHints": { "collapsed": ["P-1"] }
        }))
        .unwrap();

        assert!(doc.structure_confirmed);
        assert_eq!(doc.extra["layoutHints"]["collapsed"][0], "P-1");

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["layoutHints"]["collapsed"][0], "P-1");
        assert_eq!(back["structureConfirmed"], true);
    }

    #[test]
    fn test_assign_missing_ids_keeps_existing_ones() {
        let mut doc = LegacyDocument::default();
        doc.l1.id = "L1-KEEP".into();
        doc.l2.push(LegacyProcess {
            name: "Machining".into(),
            failure_modes: vec![LegacyFailureMode {
                name: "Crack".into(),
                ..Default::default()
            }],
            ..Default::default()
        });

        doc.assign_missing_ids(&mut IdMinter::sequential());

        assert_eq!(doc.l1.id, "L1-KEEP");
        assert_eq!(doc.l2[0].id, "L2-0001");
        assert_eq!(doc.l2[0].failure_modes[0].id, "FM-0002");
    }

    #[test]
    fn test_derived_ids_repeat_for_the_same_tree() {
        let tree = || {
            let mut doc = LegacyDocument::default();
            doc.l2.push(LegacyProcess {
                no: "10".into(),
                name: "Machining".into(),
                failure_modes: vec![
                    LegacyFailureMode {
                        name: "Crack".into(),
                        ..Default::default()
                    },
                    LegacyFailureMode {
                        name: "Crack".into(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            });
            doc
        };
        let key = AnalysisKey::parse("PFM-IDS").unwrap();

        let mut first = tree();
        first.assign_missing_ids(&mut IdMinter::derived(&key));
        let mut second = tree();
        second.assign_missing_ids(&mut IdMinter::derived(&key));

        assert_eq!(first, second);
        let modes = &first.l2[0].failure_modes;
        assert!(modes[0].id.starts_with("FM-"));
        assert_ne!(modes[0].id, modes[1].id);
    }

    #[test]
    fn test_merge_registration_incoming_wins() {
        let existing = LegacyDocument {
            project: Some(ProjectInfo {
                project_name: "Caliper 2026".into(),
                ..Default::default()
            }),
            team: Some(vec![TeamMember {
                name: "J. Kim".into(),
                ..Default::default()
            }]),
            extra: Map::from_iter([("revision".to_string(), json!(3))]),
            ..Default::default()
        };

        let mut incoming = LegacyDocument {
            team: Some(vec![]),
            ..Default::default()
        };
        incoming.merge_registration(&existing);

        assert_eq!(
            incoming.project.as_ref().map(|p| p.project_name.as_str()),
            Some("Caliper 2026")
        );
        assert_eq!(incoming.team, Some(vec![]));
        assert_eq!(incoming.extra["revision"], 3);
    }
}
