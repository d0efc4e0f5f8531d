//! Legacy tree → atomic batch

use std::collections::HashMap;
use tracing::warn;

use super::{Migrated, MigrationWarning};
use crate::flatten::flatten_links;
use crate::ids::IdMinter;
use crate::model::legacy::{
    LegacyCharacteristic, LegacyFailureLink, LegacyL1, LegacyProcess, LegacyRisk,
};
use crate::model::{
    ActionPriority, AnalysisKey, AtomicBatch, EntityKind, FailureCause, FailureEffect,
    FailureLink, FailureMode, L1Category, L1Function, L1Structure, L2Function, L2Structure,
    L3Function, L3Structure, LegacyDocument, Optimization, RiskAnalysis,
};

/// (id, text) of a record a child may attach to
type Candidate = (String, String);

struct Converter<'a> {
    key: AnalysisKey,
    ids: &'a mut IdMinter,
    batch: AtomicBatch,
    warnings: Vec<MigrationWarning>,
    /// Dropped duplicate ID → kept ID
    aliases: HashMap<String, String>,
    /// (kind, parent path, text) → first ID seen
    seen: HashMap<(EntityKind, String, String), String>,
}

impl<'a> Converter<'a> {
    fn new(key: &AnalysisKey, ids: &'a mut IdMinter) -> Self {
        Self {
            key: key.clone(),
            ids,
            batch: AtomicBatch::new(key.clone()),
            warnings: Vec::new(),
            aliases: HashMap::new(),
            seen: HashMap::new(),
        }
    }

    fn id(&mut self, raw: &str, kind: EntityKind) -> String {
        self.ids.keep_or_mint(raw, kind)
    }

    fn canonical(&self, id: &str) -> String {
        self.aliases
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Returns the kept ID when `id` duplicates an earlier leaf
    fn duplicate_of(&mut self, kind: EntityKind, parent: &str, text: &str, id: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let slot = (kind, parent.to_string(), text.to_string());
        match self.seen.get(&slot) {
            Some(kept) => {
                let kept = kept.clone();
                if kept != id {
                    self.aliases.insert(id.to_string(), kept.clone());
                    self.warnings.push(MigrationWarning::DuplicateMerged {
                        kind,
                        dropped: id.to_string(),
                        kept: kept.clone(),
                    });
                }
                Some(kept)
            }
            None => {
                self.seen.insert(slot, id.to_string());
                None
            }
        }
    }

    /// Declared ID, then text, then first candidate; every fallback is recorded
    fn resolve_parent(
        &mut self,
        kind: EntityKind,
        id: &str,
        declared: Option<&str>,
        text: Option<&str>,
        candidates: &[Candidate],
    ) -> String {
        let declared = declared
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| self.canonical(d));

        if let Some(d) = declared.as_deref() {
            if candidates.iter().any(|(cid, _)| cid == d) {
                return d.to_string();
            }
        }

        let text = text.map(str::trim).filter(|t| !t.is_empty());
        if let Some((cid, _)) =
            text.and_then(|t| candidates.iter().find(|(_, ctext)| ctext.trim() == t))
        {
            self.warnings.push(MigrationWarning::ParentResolvedByText {
                kind,
                id: id.to_string(),
                declared: declared.clone(),
                parent: cid.clone(),
            });
            return cid.clone();
        }

        if let Some((cid, _)) = candidates.first() {
            self.warnings.push(MigrationWarning::ParentFellBackToFirst {
                kind,
                id: id.to_string(),
                declared: declared.clone(),
                parent: cid.clone(),
            });
            return cid.clone();
        }

        self.warnings.push(MigrationWarning::ParentUnresolved {
            kind,
            id: id.to_string(),
            declared: declared.clone(),
        });
        declared.unwrap_or_default()
    }

    fn l1(&mut self, l1: &LegacyL1, confirmed: bool) -> String {
        let l1_id = self.id(&l1.id, EntityKind::L1Structure);
        self.batch.l1_structure = Some(L1Structure {
            id: l1_id.clone(),
            fmea_id: self.key.clone(),
            name: l1.name.clone(),
            confirmed,
        });

        for ty in &l1.types {
            let category = ty.name;
            if ty.functions.is_empty() {
                let id = self.id(&ty.id, EntityKind::L1Function);
                self.push_l1_function(id, &l1_id, category, "", "");
                continue;
            }

            for func in &ty.functions {
                if func.requirements.is_empty() {
                    let id = self.id(&func.id, EntityKind::L1Function);
                    if self
                        .duplicate_of(EntityKind::L1Function, category.code(), &func.name, &id)
                        .is_none()
                    {
                        self.push_l1_function(id, &l1_id, category, &func.name, "");
                    }
                    continue;
                }

                let path = format!("{}/{}", category.code(), func.name.trim());
                for req in &func.requirements {
                    let id = self.id(&req.id, EntityKind::L1Function);
                    if self
                        .duplicate_of(EntityKind::L1Function, &path, &req.name, &id)
                        .is_none()
                    {
                        self.push_l1_function(id, &l1_id, category, &func.name, &req.name);
                    }
                }
            }
        }

        self.failure_effects(l1);
        l1_id
    }

    fn push_l1_function(
        &mut self,
        id: String,
        l1_id: &str,
        category: L1Category,
        function_name: &str,
        requirement: &str,
    ) {
        self.batch.l1_functions.push(L1Function {
            id,
            fmea_id: self.key.clone(),
            l1_struct_id: l1_id.to_string(),
            category,
            function_name: function_name.to_string(),
            requirement: requirement.to_string(),
        });
    }

    fn failure_effects(&mut self, l1: &LegacyL1) {
        let candidates: Vec<Candidate> = self
            .batch
            .l1_functions
            .iter()
            .map(|f| (f.id.clone(), f.requirement.clone()))
            .collect();

        for scope in &l1.failure_scopes {
            let id = self.id(&scope.id, EntityKind::FailureEffect);
            let parent = self.resolve_parent(
                EntityKind::FailureEffect,
                &id,
                scope.req_id.as_deref(),
                Some(&scope.requirement),
                &candidates,
            );
            if self
                .duplicate_of(EntityKind::FailureEffect, &parent, &scope.effect, &id)
                .is_some()
            {
                continue;
            }

            let category = scope
                .scope
                .or_else(|| self.batch.l1_function(&parent).map(|f| f.category))
                .unwrap_or(L1Category::YourPlant);

            self.batch.failure_effects.push(FailureEffect {
                id,
                fmea_id: self.key.clone(),
                l1_func_id: parent,
                category,
                effect: scope.effect.clone(),
                severity: scope.severity,
            });
        }
    }

    fn process(&mut self, l1_id: &str, index: usize, process: &LegacyProcess) {
        let l2_id = self.id(&process.id, EntityKind::L2Structure);
        self.batch.l2_structures.push(L2Structure {
            id: l2_id.clone(),
            fmea_id: self.key.clone(),
            l1_id: l1_id.to_string(),
            no: process.no.clone(),
            name: process.name.clone(),
            order: process.order.unwrap_or(index as i64 + 1),
        });

        for func in &process.functions {
            let chars = self.characteristics(
                EntityKind::L2Function,
                &l2_id,
                &func.id,
                &func.name,
                &func.product_chars,
            );
            for (id, ch) in chars {
                self.batch.l2_functions.push(L2Function {
                    id,
                    fmea_id: self.key.clone(),
                    l2_struct_id: l2_id.clone(),
                    function_name: func.name.clone(),
                    product_char: ch.as_ref().map(|c| c.name.clone()).unwrap_or_default(),
                    special_char: ch.and_then(|c| c.special_char.clone()),
                });
            }
        }

        for (j, we) in process.l3.iter().enumerate() {
            let id = self.id(&we.id, EntityKind::L3Structure);
            let path = format!("{}/{}", l2_id, we.m4.map(|m| m.code()).unwrap_or_default());
            let we_id = match self.duplicate_of(EntityKind::L3Structure, &path, &we.name, &id) {
                Some(kept) => kept,
                None => {
                    self.batch.l3_structures.push(L3Structure {
                        id: id.clone(),
                        fmea_id: self.key.clone(),
                        l1_id: l1_id.to_string(),
                        l2_id: l2_id.clone(),
                        m4: we.m4,
                        name: we.name.clone(),
                        order: we.order.unwrap_or(j as i64 + 1),
                    });
                    id
                }
            };

            for func in &we.functions {
                let chars = self.characteristics(
                    EntityKind::L3Function,
                    &we_id,
                    &func.id,
                    &func.name,
                    &func.process_chars,
                );
                for (id, ch) in chars {
                    self.batch.l3_functions.push(L3Function {
                        id,
                        fmea_id: self.key.clone(),
                        l3_struct_id: we_id.clone(),
                        l2_struct_id: l2_id.clone(),
                        function_name: func.name.clone(),
                        process_char: ch.as_ref().map(|c| c.name.clone()).unwrap_or_default(),
                        special_char: ch.and_then(|c| c.special_char.clone()),
                    });
                }
            }
        }

        self.failure_modes(&l2_id, process);
        self.failure_causes(&l2_id, process);
    }

    /// Rows for one function: one per characteristic, or one for the bare function
    fn characteristics<'c>(
        &mut self,
        kind: EntityKind,
        owner: &str,
        func_id: &str,
        func_name: &str,
        chars: &'c [LegacyCharacteristic],
    ) -> Vec<(String, Option<&'c LegacyCharacteristic>)> {
        if chars.is_empty() {
            let id = self.id(func_id, kind);
            return match self.duplicate_of(kind, owner, func_name, &id) {
                Some(_) => Vec::new(),
                None => vec![(id, None)],
            };
        }

        let path = format!("{}/{}", owner, func_name.trim());
        let mut rows = Vec::with_capacity(chars.len());
        for ch in chars {
            let id = self.id(&ch.id, kind);
            if self.duplicate_of(kind, &path, &ch.name, &id).is_none() {
                rows.push((id, Some(ch)));
            }
        }
        rows
    }

    fn failure_modes(&mut self, l2_id: &str, process: &LegacyProcess) {
        let candidates: Vec<Candidate> = self
            .batch
            .l2_functions
            .iter()
            .filter(|f| f.l2_struct_id == l2_id)
            .map(|f| (f.id.clone(), f.product_char.clone()))
            .collect();

        for fm in &process.failure_modes {
            let id = self.id(&fm.id, EntityKind::FailureMode);
            let parent = self.resolve_parent(
                EntityKind::FailureMode,
                &id,
                fm.product_char_id.as_deref(),
                fm.product_char.as_deref(),
                &candidates,
            );
            if self
                .duplicate_of(EntityKind::FailureMode, &parent, &fm.name, &id)
                .is_some()
            {
                continue;
            }

            self.batch.failure_modes.push(FailureMode {
                id,
                fmea_id: self.key.clone(),
                l2_func_id: parent,
                l2_struct_id: l2_id.to_string(),
                mode: fm.name.clone(),
                special_char: fm.sc,
            });
        }
    }

    fn failure_causes(&mut self, l2_id: &str, process: &LegacyProcess) {
        let candidates: Vec<Candidate> = self
            .batch
            .l3_functions
            .iter()
            .filter(|f| f.l2_struct_id == l2_id)
            .map(|f| (f.id.clone(), f.process_char.clone()))
            .collect();

        for fc in &process.failure_causes {
            let id = self.id(&fc.id, EntityKind::FailureCause);
            let parent = self.resolve_parent(
                EntityKind::FailureCause,
                &id,
                fc.process_char_id.as_deref(),
                fc.process_char.as_deref(),
                &candidates,
            );
            if self
                .duplicate_of(EntityKind::FailureCause, &parent, &fc.name, &id)
                .is_some()
            {
                continue;
            }

            let l3_struct_id = self
                .batch
                .l3_function(&parent)
                .map(|f| f.l3_struct_id.clone())
                .unwrap_or_default();

            self.batch.failure_causes.push(FailureCause {
                id,
                fmea_id: self.key.clone(),
                l3_func_id: parent,
                l3_struct_id,
                l2_struct_id: l2_id.to_string(),
                cause: fc.name.clone(),
                occurrence: fc.occurrence,
            });
        }
    }

    fn links(&mut self, links: &[LegacyFailureLink]) {
        for link in links {
            let id = self.id(&link.id, EntityKind::FailureLink);

            let ends = [("fmId", &link.fm_id), ("feId", &link.fe_id), ("fcId", &link.fc_id)];
            let missing: Vec<String> = ends
                .iter()
                .filter(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
                .map(|(name, _)| name.to_string())
                .collect();
            if !missing.is_empty() {
                self.warnings
                    .push(MigrationWarning::DraftLinkSkipped { id, missing });
                continue;
            }

            let end = |v: &Option<String>| self.canonical(v.as_deref().unwrap_or("").trim());
            let edge = FailureLink {
                id,
                fmea_id: self.key.clone(),
                fm_id: end(&link.fm_id),
                fe_id: end(&link.fe_id),
                fc_id: end(&link.fc_id),
            };
            self.batch.failure_links.push(edge);
        }
    }

    fn risks(&mut self, risks: &[LegacyRisk]) {
        for risk in risks {
            let id = self.id(&risk.id, EntityKind::RiskAnalysis);
            let ap = risk.ap.or_else(|| {
                ActionPriority::from_optional(risk.severity, risk.occurrence, risk.detection)
            });

            if let Some(opt) = &risk.optimization {
                let opt_id = self.id(&opt.id, EntityKind::Optimization);
                self.batch.optimizations.push(Optimization {
                    id: opt_id,
                    fmea_id: self.key.clone(),
                    risk_id: id.clone(),
                    recommended_action: opt.recommended_action.clone(),
                    responsible: opt.responsible.clone(),
                    target_date: opt.target_date,
                    new_severity: opt.new_severity,
                    new_occurrence: opt.new_occurrence,
                    new_detection: opt.new_detection,
                    new_ap: ActionPriority::from_optional(
                        opt.new_severity.or(risk.severity),
                        opt.new_occurrence,
                        opt.new_detection,
                    ),
                    status: opt.status,
                    remarks: opt.remarks.clone(),
                });
            }

            self.batch.risk_analyses.push(RiskAnalysis {
                id,
                fmea_id: self.key.clone(),
                link_id: self.canonical(&risk.link_id),
                severity: risk.severity,
                occurrence: risk.occurrence,
                detection: risk.detection,
                ap,
                prevention_control: risk.prevention_control.clone(),
                detection_control: risk.detection_control.clone(),
            });
        }
    }
}

/// Convert a legacy snapshot into one atomic record per leaf
///
/// Nodes keep their IDs; `ids` fills in only the ones that are missing. Call
/// [`LegacyDocument::assign_missing_ids`] first when the same snapshot is also
/// stored, so both forms carry identical IDs.
pub fn to_atomic(
    key: &AnalysisKey,
    doc: &LegacyDocument,
    ids: &mut IdMinter,
) -> Migrated<AtomicBatch> {
    let mut conv = Converter::new(key, ids);

    let l1_id = conv.l1(&doc.l1, doc.structure_confirmed);
    for (index, process) in doc.l2.iter().enumerate() {
        conv.process(&l1_id, index, process);
    }
    conv.links(&doc.failure_links);
    if let Some(risks) = &doc.risks {
        conv.risks(risks);
    }

    conv.batch.confirmed = Some(doc.confirmed_state(key));
    if doc.failure_link_confirmed {
        conv.batch.failure_analyses = flatten_links(&conv.batch);
    }

    for warning in &conv.warnings {
        warn!(fmea_id = %key, "Migration: {}", warning);
    }

    Migrated {
        value: conv.batch,
        warnings: conv.warnings,
    }
}
