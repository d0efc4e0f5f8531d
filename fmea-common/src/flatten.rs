//! Pre-joined FailureAnalysis rows
//!
//! One row per link whose FM, FE and FC all resolve, carrying every upstream
//! display field so the analysis view needs no joins. Rows are derived data:
//! they are rebuilt from scratch whenever links or their confirmation change.

use tracing::debug;

use crate::model::{AtomicBatch, FailureAnalysis, FailureLink};

/// Deterministic row ID so a re-save produces identical rows
pub fn analysis_id(link_id: &str) -> String {
    format!("FA-{}", link_id)
}

fn flatten_one(batch: &AtomicBatch, link: &FailureLink, order: i64) -> Option<FailureAnalysis> {
    let fm = batch.failure_mode(&link.fm_id)?;
    let fe = batch.failure_effect(&link.fe_id)?;
    let fc = batch.failure_cause(&link.fc_id)?;

    let l1f = batch.l1_function(&fe.l1_func_id);
    let l2 = batch.l2_structure(&fm.l2_struct_id);
    let l2f = batch.l2_function(&fm.l2_func_id);
    let l3 = batch.l3_structure(&fc.l3_struct_id);
    let l3f = batch.l3_function(&fc.l3_func_id);

    Some(FailureAnalysis {
        id: analysis_id(&link.id),
        fmea_id: batch.fmea_id.clone(),
        link_id: link.id.clone(),
        fm_id: fm.id.clone(),
        fe_id: fe.id.clone(),
        fc_id: fc.id.clone(),
        l1_name: batch
            .l1_structure
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_default(),
        l1_category: l1f.map_or(fe.category, |f| f.category),
        l1_function: l1f.map(|f| f.function_name.clone()).unwrap_or_default(),
        l1_requirement: l1f.map(|f| f.requirement.clone()).unwrap_or_default(),
        fe_effect: fe.effect.clone(),
        fe_severity: fe.severity,
        l2_no: l2.map(|s| s.no.clone()).unwrap_or_default(),
        l2_name: l2.map(|s| s.name.clone()).unwrap_or_default(),
        l2_function: l2f.map(|f| f.function_name.clone()).unwrap_or_default(),
        product_char: l2f.map(|f| f.product_char.clone()).unwrap_or_default(),
        fm_mode: fm.mode.clone(),
        fm_special_char: fm.special_char,
        l3_m4: l3.and_then(|s| s.m4),
        l3_name: l3.map(|s| s.name.clone()).unwrap_or_default(),
        l3_function: l3f.map(|f| f.function_name.clone()).unwrap_or_default(),
        process_char: l3f.map(|f| f.process_char.clone()).unwrap_or_default(),
        fc_cause: fc.cause.clone(),
        fc_occurrence: fc.occurrence,
        order,
    })
}

/// Build analysis rows for every fully resolvable link, in link order
pub fn flatten_links(batch: &AtomicBatch) -> Vec<FailureAnalysis> {
    let rows: Vec<FailureAnalysis> = batch
        .failure_links
        .iter()
        .enumerate()
        .filter_map(|(i, link)| flatten_one(batch, link, i as i64 + 1))
        .collect();

    if rows.len() < batch.failure_links.len() {
        debug!(
            fmea_id = %batch.fmea_id,
            skipped = batch.failure_links.len() - rows.len(),
            "Links without resolvable FM/FE/FC left out of analysis rows"
        );
    }
    rows
}
