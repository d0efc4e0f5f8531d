//! Property tests over generated worksheets

use fmea_common::chain::FailureChainGrouper;
use fmea_common::ids::IdMinter;
use fmea_common::migrate::{to_atomic, to_legacy};
use fmea_common::model::{AnalysisKey, AtomicBatch, EntityKind, LegacyDocument, Record};
use fmea_common::score::{completeness_score, leaf_count, ScoreWeights};
use fmea_common::validate::{validate_batch, AcceptedKeys};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;

/// Shape of a generated worksheet
#[derive(Debug, Clone)]
struct Shape {
    /// (failure modes, failure causes) per process step
    processes: Vec<(usize, usize)>,
    effects: usize,
    /// (process, mode, effect, cause) picks, reduced modulo the counts
    links: Vec<(usize, usize, usize, usize)>,
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        prop::collection::vec((0usize..4, 0usize..4), 1..4),
        0usize..4,
        prop::collection::vec((0usize..8, 0usize..8, 0usize..8, 0usize..8), 0..8),
    )
        .prop_map(|(processes, effects, links)| Shape {
            processes,
            effects,
            links,
        })
}

fn worksheet(shape: &Shape) -> LegacyDocument {
    let scopes: Vec<Value> = (0..shape.effects)
        .map(|e| {
            json!({
                "id": format!("FE-{}", e),
                "reqId": "REQ-1",
                "requirement": "Clamp force",
                "scope": "User",
                "effect": format!("Effect {}", e),
                "severity": (e % 10) + 1
            })
        })
        .collect();

    let processes: Vec<Value> = shape
        .processes
        .iter()
        .enumerate()
        .map(|(p, &(modes, causes))| {
            json!({
                "id": format!("P-{}", p),
                "no": format!("{}", (p + 1) * 10),
                "name": format!("Step {}", p),
                "order": p,
                "functions": [{
                    "id": format!("PF-{}", p),
                    "name": format!("Function {}", p),
                    "productChars": [{ "id": format!("PC-{}", p), "name": format!("Char {}", p) }]
                }],
                "l3": [{
                    "id": format!("WE-{}", p),
                    "m4": "MC",
                    "name": format!("Machine {}", p),
                    "order": 0,
                    "functions": [{
                        "id": format!("WF-{}", p),
                        "name": format!("Operate {}", p),
                        "processChars": [{ "id": format!("PR-{}", p), "name": format!("Param {}", p) }]
                    }]
                }],
                "failureModes": (0..modes).map(|m| json!({
                    "id": format!("FM-{}-{}", p, m),
                    "name": format!("Mode {}-{}", p, m),
                    "productCharId": format!("PC-{}", p)
                })).collect::<Vec<_>>(),
                "failureCauses": (0..causes).map(|c| json!({
                    "id": format!("FC-{}-{}", p, c),
                    "name": format!("Cause {}-{}", p, c),
                    "processCharId": format!("PR-{}", p),
                    "occurrence": c + 1
                })).collect::<Vec<_>>()
            })
        })
        .collect();

    let mut links = Vec::new();
    for (i, &(p, m, e, c)) in shape.links.iter().enumerate() {
        let p = p % shape.processes.len();
        let (modes, causes) = shape.processes[p];
        if modes == 0 || causes == 0 || shape.effects == 0 {
            continue;
        }
        links.push(json!({
            "id": format!("LK-{}", i),
            "fmId": format!("FM-{}-{}", p, m % modes),
            "feId": format!("FE-{}", e % shape.effects),
            "fcId": format!("FC-{}-{}", p, c % causes)
        }));
    }

    serde_json::from_value(json!({
        "l1": {
            "id": "L1-1",
            "name": "Generated product",
            "types": [{
                "id": "T-USER",
                "name": "User",
                "functions": [{
                    "id": "F-1",
                    "name": "Stop vehicle",
                    "requirements": [{ "id": "REQ-1", "name": "Clamp force" }]
                }]
            }],
            "failureScopes": scopes
        },
        "l2": processes,
        "failureLinks": links
    }))
    .unwrap()
}

fn key() -> AnalysisKey {
    AnalysisKey::parse("PFM-PROP").unwrap()
}

/// Every declared FK of every record, as (target kind, value)
fn declared_keys(batch: &AtomicBatch) -> Vec<(EntityKind, String)> {
    fn collect<R: Record>(records: &[R], out: &mut Vec<(EntityKind, String)>) {
        for record in records {
            for fk in record.foreign_keys() {
                out.push((fk.target, fk.value.to_string()));
            }
        }
    }

    let mut out = Vec::new();
    if let Some(l1) = &batch.l1_structure {
        collect(std::slice::from_ref(l1), &mut out);
    }
    collect(&batch.l2_structures, &mut out);
    collect(&batch.l3_structures, &mut out);
    collect(&batch.l1_functions, &mut out);
    collect(&batch.l2_functions, &mut out);
    collect(&batch.l3_functions, &mut out);
    collect(&batch.failure_effects, &mut out);
    collect(&batch.failure_modes, &mut out);
    collect(&batch.failure_causes, &mut out);
    collect(&batch.failure_links, &mut out);
    collect(&batch.failure_analyses, &mut out);
    collect(&batch.risk_analyses, &mut out);
    collect(&batch.optimizations, &mut out);
    out
}

proptest! {
    #[test]
    fn prop_reconstruction_reconverts_to_same_batch(shape in shape()) {
        let first = to_atomic(&key(), &worksheet(&shape), &mut IdMinter::sequential()).value;
        let second = to_atomic(&key(), &to_legacy(&first), &mut IdMinter::sequential());

        prop_assert!(second.warnings.is_empty(), "{:?}", second.warnings);
        prop_assert_eq!(second.value, first);
    }

    #[test]
    fn prop_every_group_is_rectangular(shape in shape()) {
        let batch = to_atomic(&key(), &worksheet(&shape), &mut IdMinter::sequential()).value;
        let groups = FailureChainGrouper::from_batch(&batch);

        prop_assert_eq!(groups.len(), batch.failure_modes.len());
        for group in &groups {
            prop_assert!(group.is_rectangular(), "{:?}", group);
            prop_assert_eq!(group.rows.len(), group.max_rows);
            prop_assert_eq!(group.max_rows, group.effect_count.max(group.cause_count).max(1));
        }

        // Every link's effect and cause is rendered in its mode's group
        for link in &batch.failure_links {
            let group = groups.iter().find(|g| g.fm_id == link.fm_id).unwrap();
            prop_assert!(group.rows.iter().any(|r| r.fe.value().is_some_and(|fe| fe.id == link.fe_id)));
            prop_assert!(group.rows.iter().any(|r| r.fc.value().is_some_and(|fc| fc.id == link.fc_id)));
        }
    }

    #[test]
    fn prop_adding_a_mode_never_lowers_completeness(shape in shape(), step in 0usize..4) {
        let weights = ScoreWeights::default();
        let before = worksheet(&shape);

        let mut after = before.clone();
        let step = step % after.l2.len();
        let mut extra = after.l2[step].failure_modes.first().cloned().unwrap_or_default();
        extra.id = "FM-EXTRA".into();
        extra.name = "Extra mode".into();
        after.l2[step].failure_modes.push(extra);

        prop_assert!(completeness_score(Some(&after), &weights) > completeness_score(Some(&before), &weights));
        prop_assert!(leaf_count(Some(&after)) > leaf_count(Some(&before)));
    }

    #[test]
    fn prop_validated_batch_is_closed(shape in shape(), broken in prop::collection::vec(0usize..16, 0..4)) {
        let mut batch = to_atomic(&key(), &worksheet(&shape), &mut IdMinter::sequential()).value;

        // Point a few parent references at nothing
        for pick in broken {
            match pick % 4 {
                0 if !batch.failure_modes.is_empty() => {
                    let i = pick % batch.failure_modes.len();
                    batch.failure_modes[i].l2_struct_id = "P-GONE".into();
                }
                1 if !batch.failure_causes.is_empty() => {
                    let i = pick % batch.failure_causes.len();
                    batch.failure_causes[i].l3_func_id = "WF-GONE".into();
                }
                2 if !batch.failure_effects.is_empty() => {
                    let i = pick % batch.failure_effects.len();
                    batch.failure_effects[i].l1_func_id = "REQ-GONE".into();
                }
                3 if !batch.l2_structures.is_empty() => {
                    let i = pick % batch.l2_structures.len();
                    batch.l2_structures[i].l1_id = "L1-GONE".into();
                }
                _ => {}
            }
        }

        validate_batch(&mut batch, &AcceptedKeys::new());

        for (target, value) in declared_keys(&batch) {
            let present: HashSet<String> = batch.ids_of(target).into_iter().collect();
            prop_assert!(present.contains(&value), "{:?} {} dangles", target, value);
        }
    }
}
