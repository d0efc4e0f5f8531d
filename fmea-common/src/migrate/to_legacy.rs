//! Atomic batch → legacy tree
//!
//! Replays the parent keys in reverse. Grouping nodes that have no atomic row
//! of their own (an L1 type or a function carrying characteristics) get a
//! derived ID; leaf IDs are always the atomic record IDs.

use crate::model::legacy::{
    LegacyCharacteristic, LegacyFailureCause, LegacyFailureLink, LegacyFailureMode,
    LegacyFailureScope, LegacyL1, LegacyL1Function, LegacyL1Type, LegacyL2Function,
    LegacyL3Function, LegacyNamed, LegacyOptimization, LegacyProcess, LegacyRisk,
    LegacyWorkElement,
};
use crate::model::{AtomicBatch, L1Function, L2Function, L3Function, LegacyDocument};

/// Group `items` by `key`, keeping first-appearance order of groups and items
fn group_ordered<'a, T, K, F>(items: impl IntoIterator<Item = &'a T>, key: F) -> Vec<(K, Vec<&'a T>)>
where
    T: 'a,
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut groups: Vec<(K, Vec<&'a T>)> = Vec::new();
    for item in items {
        let k = key(item);
        match groups.iter_mut().find(|(g, _)| *g == k) {
            Some((_, members)) => members.push(item),
            None => groups.push((k, vec![item])),
        }
    }
    groups
}

fn derived_id(first_child: &str, suffix: &str) -> String {
    format!("{}-{}", first_child, suffix)
}

fn l1_tree(batch: &AtomicBatch) -> LegacyL1 {
    let (l1_id, l1_name) = batch
        .l1_structure
        .as_ref()
        .map(|s| (s.id.clone(), s.name.clone()))
        .unwrap_or_default();

    let types = group_ordered(&batch.l1_functions, |f| f.category)
        .into_iter()
        .map(|(category, rows)| {
            // A row with neither function nor requirement stands for the type itself
            let placeholder = rows
                .iter()
                .find(|f| f.function_name.is_empty() && f.requirement.is_empty());
            let id = placeholder
                .map(|f| f.id.clone())
                .unwrap_or_else(|| derived_id(&l1_id, category.code()));

            let functions = group_ordered(
                rows.into_iter()
                    .filter(|f| !(f.function_name.is_empty() && f.requirement.is_empty())),
                |f: &L1Function| f.function_name.clone(),
            )
            .into_iter()
            .map(|(name, rows)| {
                let bare = rows.iter().find(|f| f.requirement.is_empty());
                let requirements: Vec<LegacyNamed> = rows
                    .iter()
                    .filter(|f| !f.requirement.is_empty())
                    .map(|f| LegacyNamed {
                        id: f.id.clone(),
                        name: f.requirement.clone(),
                    })
                    .collect();
                let id = match (bare, requirements.first()) {
                    (Some(f), _) => f.id.clone(),
                    (None, Some(req)) => derived_id(&req.id, "fn"),
                    (None, None) => String::new(),
                };
                LegacyL1Function {
                    id,
                    name,
                    requirements,
                }
            })
            .collect();

            LegacyL1Type {
                id,
                name: category,
                functions,
            }
        })
        .collect();

    let failure_scopes = batch
        .failure_effects
        .iter()
        .map(|fe| LegacyFailureScope {
            id: fe.id.clone(),
            req_id: Some(fe.l1_func_id.clone()),
            requirement: batch
                .l1_function(&fe.l1_func_id)
                .map(|f| f.requirement.clone())
                .unwrap_or_default(),
            scope: Some(fe.category),
            effect: fe.effect.clone(),
            severity: fe.severity,
        })
        .collect();

    LegacyL1 {
        id: l1_id,
        name: l1_name,
        types,
        failure_scopes,
    }
}

/// Rebuild function → characteristic nesting from flat function rows
fn group_functions<'a, T, F>(
    rows: Vec<&'a T>,
    name: impl Fn(&T) -> &str,
    characteristic: F,
) -> Vec<(String, String, Vec<LegacyCharacteristic>)>
where
    F: Fn(&T) -> Option<LegacyCharacteristic>,
    T: 'a + HasId,
{
    group_ordered(rows, |r| name(r).to_string())
        .into_iter()
        .map(|(func_name, rows)| {
            let chars: Vec<LegacyCharacteristic> =
                rows.iter().filter_map(|&r| characteristic(r)).collect();
            let bare = rows.iter().copied().find(|&r| characteristic(r).is_none());
            let id = match (bare, chars.first()) {
                (Some(r), _) => r.row_id().to_string(),
                (None, Some(ch)) => derived_id(&ch.id, "fn"),
                (None, None) => String::new(),
            };
            (id, func_name, chars)
        })
        .collect()
}

trait HasId {
    fn row_id(&self) -> &str;
}

impl HasId for L2Function {
    fn row_id(&self) -> &str {
        &self.id
    }
}

impl HasId for L3Function {
    fn row_id(&self) -> &str {
        &self.id
    }
}

fn l2_characteristic(f: &L2Function) -> Option<LegacyCharacteristic> {
    (!f.product_char.is_empty()).then(|| LegacyCharacteristic {
        id: f.id.clone(),
        name: f.product_char.clone(),
        special_char: f.special_char.clone(),
    })
}

fn l3_characteristic(f: &L3Function) -> Option<LegacyCharacteristic> {
    (!f.process_char.is_empty()).then(|| LegacyCharacteristic {
        id: f.id.clone(),
        name: f.process_char.clone(),
        special_char: f.special_char.clone(),
    })
}

fn process_tree(batch: &AtomicBatch) -> Vec<LegacyProcess> {
    let mut structures: Vec<_> = batch.l2_structures.iter().collect();
    structures.sort_by_key(|s| s.order);

    structures
        .into_iter()
        .map(|l2| {
            let functions = group_functions(
                batch
                    .l2_functions
                    .iter()
                    .filter(|f| f.l2_struct_id == l2.id)
                    .collect(),
                |f| f.function_name.as_str(),
                l2_characteristic,
            )
            .into_iter()
            .map(|(id, name, product_chars)| LegacyL2Function {
                id,
                name,
                product_chars,
            })
            .collect();

            let mut elements: Vec<_> = batch
                .l3_structures
                .iter()
                .filter(|s| s.l2_id == l2.id)
                .collect();
            elements.sort_by_key(|s| s.order);

            let l3 = elements
                .into_iter()
                .map(|we| LegacyWorkElement {
                    id: we.id.clone(),
                    m4: we.m4,
                    name: we.name.clone(),
                    order: Some(we.order),
                    functions: group_functions(
                        batch
                            .l3_functions
                            .iter()
                            .filter(|f| f.l3_struct_id == we.id)
                            .collect(),
                        |f| f.function_name.as_str(),
                        l3_characteristic,
                    )
                    .into_iter()
                    .map(|(id, name, process_chars)| LegacyL3Function {
                        id,
                        name,
                        process_chars,
                    })
                    .collect(),
                })
                .collect();

            let failure_modes = batch
                .failure_modes
                .iter()
                .filter(|fm| fm.l2_struct_id == l2.id)
                .map(|fm| LegacyFailureMode {
                    id: fm.id.clone(),
                    name: fm.mode.clone(),
                    sc: fm.special_char,
                    product_char_id: Some(fm.l2_func_id.clone()),
                    product_char: batch.l2_function(&fm.l2_func_id).map(|f| f.product_char.clone()),
                })
                .collect();

            let failure_causes = batch
                .failure_causes
                .iter()
                .filter(|fc| fc.l2_struct_id == l2.id)
                .map(|fc| LegacyFailureCause {
                    id: fc.id.clone(),
                    name: fc.cause.clone(),
                    occurrence: fc.occurrence,
                    process_char_id: Some(fc.l3_func_id.clone()),
                    process_char: batch.l3_function(&fc.l3_func_id).map(|f| f.process_char.clone()),
                })
                .collect();

            LegacyProcess {
                id: l2.id.clone(),
                no: l2.no.clone(),
                name: l2.name.clone(),
                order: Some(l2.order),
                functions,
                l3,
                failure_modes,
                failure_causes,
            }
        })
        .collect()
}

fn risks(batch: &AtomicBatch) -> Option<Vec<LegacyRisk>> {
    if batch.risk_analyses.is_empty() && batch.optimizations.is_empty() {
        return None;
    }

    let risks = batch
        .risk_analyses
        .iter()
        .map(|risk| LegacyRisk {
            id: risk.id.clone(),
            link_id: risk.link_id.clone(),
            severity: risk.severity,
            occurrence: risk.occurrence,
            detection: risk.detection,
            ap: risk.ap,
            prevention_control: risk.prevention_control.clone(),
            detection_control: risk.detection_control.clone(),
            optimization: batch
                .optimizations
                .iter()
                .find(|opt| opt.risk_id == risk.id)
                .map(|opt| LegacyOptimization {
                    id: opt.id.clone(),
                    recommended_action: opt.recommended_action.clone(),
                    responsible: opt.responsible.clone(),
                    target_date: opt.target_date,
                    new_severity: opt.new_severity,
                    new_occurrence: opt.new_occurrence,
                    new_detection: opt.new_detection,
                    status: opt.status,
                    remarks: opt.remarks.clone(),
                }),
        })
        .collect();
    Some(risks)
}

/// Rebuild the nested snapshot from atomic records
///
/// Registration fields (project, team, unknown fields) are not part of the
/// atomic model and come back empty; callers merge them from the stored
/// snapshot.
pub fn to_legacy(batch: &AtomicBatch) -> LegacyDocument {
    let failure_links = batch
        .failure_links
        .iter()
        .map(|link| {
            let fe = batch.failure_effect(&link.fe_id);
            LegacyFailureLink {
                id: link.id.clone(),
                fm_id: Some(link.fm_id.clone()),
                fe_id: Some(link.fe_id.clone()),
                fc_id: Some(link.fc_id.clone()),
                fm_text: batch.failure_mode(&link.fm_id).map(|fm| fm.mode.clone()),
                fe_text: fe.map(|fe| fe.effect.clone()),
                fc_text: batch.failure_cause(&link.fc_id).map(|fc| fc.cause.clone()),
                severity: fe.and_then(|fe| fe.severity),
            }
        })
        .collect();

    let mut doc = LegacyDocument {
        l1: l1_tree(batch),
        l2: process_tree(batch),
        failure_links,
        risks: risks(batch),
        ..Default::default()
    };

    match &batch.confirmed {
        Some(state) => doc.apply_confirmed_state(state),
        None => {
            doc.structure_confirmed = batch.l1_structure.as_ref().is_some_and(|s| s.confirmed);
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdMinter;
    use crate::migrate::fixtures::brake_caliper;
    use crate::migrate::to_atomic;
    use crate::model::{AnalysisKey, L1Category, Rating};

    fn key() -> AnalysisKey {
        AnalysisKey::parse("PFM-L").unwrap()
    }

    #[test]
    fn test_round_trip_keeps_names_and_severity() {
        let batch = to_atomic(&key(), &brake_caliper(), &mut IdMinter::sequential()).value;
        let doc = to_legacy(&batch);

        assert_eq!(doc.l1.name, "Brake Caliper");
        assert_eq!(doc.l2.len(), 1);
        assert_eq!(doc.l2[0].name, "Machining");
        assert_eq!(doc.l2[0].no, "10");
        assert_eq!(doc.l2[0].l3[0].name, "CNC Lathe");
        assert_eq!(doc.l2[0].failure_modes[0].name, "Crack");
        assert_eq!(doc.l2[0].failure_causes[0].name, "Tool Wear");
        assert_eq!(doc.l1.failure_scopes[0].effect, "Stop Function Loss");
        assert_eq!(doc.l1.failure_scopes[0].severity.map(Rating::get), Some(9));
        assert_eq!(doc.failure_links[0].fe_text.as_deref(), Some("Stop Function Loss"));
    }

    #[test]
    fn test_reconverting_reconstruction_is_stable() {
        let first = to_atomic(&key(), &brake_caliper(), &mut IdMinter::sequential()).value;
        let second = to_atomic(&key(), &to_legacy(&first), &mut IdMinter::sequential());

        assert!(second.warnings.is_empty(), "{:?}", second.warnings);
        assert_eq!(second.value, first);
    }

    #[test]
    fn test_l1_functions_regroup_by_category_then_function() {
        let mut batch = AtomicBatch::new(key());
        let row = |id: &str, category, func: &str, req: &str| L1Function {
            id: id.into(),
            fmea_id: key(),
            l1_struct_id: "L1-1".into(),
            category,
            function_name: func.into(),
            requirement: req.into(),
        };
        batch.l1_functions = vec![
            row("R-1", L1Category::User, "Stop vehicle", "Clamp force"),
            row("R-2", L1Category::YourPlant, "Assemble", "Torque"),
            row("R-3", L1Category::User, "Stop vehicle", "Pedal feel"),
            row("F-9", L1Category::User, "Release", ""),
        ];

        let l1 = to_legacy(&batch).l1;
        assert_eq!(l1.types.len(), 2);
        assert_eq!(l1.types[0].name, L1Category::User);
        let user_fns = &l1.types[0].functions;
        assert_eq!(user_fns.len(), 2);
        assert_eq!(user_fns[0].requirements.len(), 2);
        assert_eq!(user_fns[0].requirements[1].id, "R-3");
        assert_eq!(user_fns[1].id, "F-9");
        assert!(user_fns[1].requirements.is_empty());
    }

    #[test]
    fn test_no_risk_rows_means_no_risk_list() {
        let batch = AtomicBatch::new(key());
        assert!(to_legacy(&batch).risks.is_none());
    }
}
