//! Atomic record types, one per table

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ActionPriority, AnalysisKey, EntityKind, ForeignKey, Rating, Record};

/// 4M category of a work element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FourM {
    #[serde(rename = "MN", alias = "Man")]
    Man,
    #[serde(rename = "MC", alias = "Machine")]
    Machine,
    #[serde(rename = "IM", alias = "Material")]
    Material,
    #[serde(rename = "EN", alias = "Environment")]
    Environment,
}

impl FourM {
    pub fn code(self) -> &'static str {
        match self {
            FourM::Man => "MN",
            FourM::Machine => "MC",
            FourM::Material => "IM",
            FourM::Environment => "EN",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "MN" => Some(FourM::Man),
            "MC" => Some(FourM::Machine),
            "IM" => Some(FourM::Material),
            "EN" => Some(FourM::Environment),
            _ => None,
        }
    }
}

/// Scope of a top-level function and of the failure effects under it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum L1Category {
    #[serde(rename = "Your Plant", alias = "YP")]
    YourPlant,
    #[serde(rename = "Ship to Plant", alias = "SP")]
    ShipToPlant,
    #[serde(rename = "User", alias = "USER")]
    User,
}

impl L1Category {
    pub fn code(self) -> &'static str {
        match self {
            L1Category::YourPlant => "YP",
            L1Category::ShipToPlant => "SP",
            L1Category::User => "USER",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "YP" => Some(L1Category::YourPlant),
            "SP" => Some(L1Category::ShipToPlant),
            "USER" => Some(L1Category::User),
            _ => None,
        }
    }
}

/// Progress of an optimization action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    #[default]
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl OptimizationStatus {
    pub fn code(self) -> &'static str {
        match self {
            OptimizationStatus::Open => "open",
            OptimizationStatus::InProgress => "in_progress",
            OptimizationStatus::Completed => "completed",
            OptimizationStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "open" => Some(OptimizationStatus::Open),
            "in_progress" => Some(OptimizationStatus::InProgress),
            "completed" => Some(OptimizationStatus::Completed),
            "cancelled" => Some(OptimizationStatus::Cancelled),
            _ => None,
        }
    }
}

/// Top-level product/process scope (one per analysis)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Structure {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub name: String,
    #[serde(default)]
    pub confirmed: bool,
}

/// Main process step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Structure {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub l1_id: String,
    #[serde(default)]
    pub no: String,
    pub name: String,
    #[serde(default)]
    pub order: i64,
}

/// Work element within a process step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L3Structure {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub l1_id: String,
    pub l2_id: String,
    #[serde(default)]
    pub m4: Option<FourM>,
    pub name: String,
    #[serde(default)]
    pub order: i64,
}

/// Top-level function and one of its requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Function {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub l1_struct_id: String,
    pub category: L1Category,
    pub function_name: String,
    #[serde(default)]
    pub requirement: String,
}

/// Process-step function and one product characteristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Function {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub l2_struct_id: String,
    pub function_name: String,
    #[serde(default)]
    pub product_char: String,
    #[serde(default)]
    pub special_char: Option<String>,
}

/// Work-element function and one process characteristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L3Function {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub l3_struct_id: String,
    pub l2_struct_id: String,
    pub function_name: String,
    #[serde(default)]
    pub process_char: String,
    #[serde(default)]
    pub special_char: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEffect {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub l1_func_id: String,
    pub category: L1Category,
    pub effect: String,
    #[serde(default)]
    pub severity: Option<Rating>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureMode {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub l2_func_id: String,
    pub l2_struct_id: String,
    pub mode: String,
    #[serde(default)]
    pub special_char: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureCause {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub l3_func_id: String,
    pub l3_struct_id: String,
    pub l2_struct_id: String,
    pub cause: String,
    #[serde(default)]
    pub occurrence: Option<Rating>,
}

/// One FM ↔ FE ↔ FC edge; identity is the (fm, fe, fc) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureLink {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub fm_id: String,
    pub fe_id: String,
    pub fc_id: String,
}

impl FailureLink {
    pub fn triple(&self) -> (&str, &str, &str) {
        (&self.fm_id, &self.fe_id, &self.fc_id)
    }
}

/// Pre-joined view of a confirmed link, regenerated on every link save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAnalysis {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub link_id: String,
    pub fm_id: String,
    pub fe_id: String,
    pub fc_id: String,
    pub l1_name: String,
    pub l1_category: L1Category,
    pub l1_function: String,
    pub l1_requirement: String,
    pub fe_effect: String,
    pub fe_severity: Option<Rating>,
    pub l2_no: String,
    pub l2_name: String,
    pub l2_function: String,
    pub product_char: String,
    pub fm_mode: String,
    pub fm_special_char: bool,
    pub l3_m4: Option<FourM>,
    pub l3_name: String,
    pub l3_function: String,
    pub process_char: String,
    pub fc_cause: String,
    pub fc_occurrence: Option<Rating>,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub id: String,
    pub fmea_id: AnalysisKey,
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
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    pub id: String,
    pub fmea_id: AnalysisKey,
    pub risk_id: String,
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
    pub new_ap: Option<ActionPriority>,
    #[serde(default)]
    pub status: OptimizationStatus,
    #[serde(default)]
    pub remarks: String,
}

/// Per-stage sign-off flags (one row per analysis)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedState {
    pub fmea_id: AnalysisKey,
    #[serde(default)]
    pub structure: bool,
    #[serde(default)]
    pub l1_function: bool,
    #[serde(default)]
    pub l2_function: bool,
    #[serde(default)]
    pub l3_function: bool,
    #[serde(default)]
    pub failure_l1: bool,
    #[serde(default)]
    pub failure_l2: bool,
    #[serde(default)]
    pub failure_l3: bool,
    #[serde(default)]
    pub failure_link: bool,
    #[serde(default)]
    pub risk: bool,
    #[serde(default)]
    pub optimization: bool,
}

impl ConfirmedState {
    pub fn unconfirmed(fmea_id: AnalysisKey) -> Self {
        Self {
            fmea_id,
            structure: false,
            l1_function: false,
            l2_function: false,
            l3_function: false,
            failure_l1: false,
            failure_l2: false,
            failure_l3: false,
            failure_link: false,
            risk: false,
            optimization: false,
        }
    }
}

impl Record for L1Structure {
    const KIND: EntityKind = EntityKind::L1Structure;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }
}

impl Record for L2Structure {
    const KIND: EntityKind = EntityKind::L2Structure;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![ForeignKey::new("l1Id", EntityKind::L1Structure, &self.l1_id)]
    }
}

impl Record for L3Structure {
    const KIND: EntityKind = EntityKind::L3Structure;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![
            ForeignKey::new("l1Id", EntityKind::L1Structure, &self.l1_id),
            ForeignKey::new("l2Id", EntityKind::L2Structure, &self.l2_id),
        ]
    }
}

impl Record for L1Function {
    const KIND: EntityKind = EntityKind::L1Function;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![ForeignKey::new(
            "l1StructId",
            EntityKind::L1Structure,
            &self.l1_struct_id,
        )]
    }
}

impl Record for L2Function {
    const KIND: EntityKind = EntityKind::L2Function;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![ForeignKey::new(
            "l2StructId",
            EntityKind::L2Structure,
            &self.l2_struct_id,
        )]
    }
}

impl Record for L3Function {
    const KIND: EntityKind = EntityKind::L3Function;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![
            ForeignKey::new("l3StructId", EntityKind::L3Structure, &self.l3_struct_id),
            ForeignKey::new("l2StructId", EntityKind::L2Structure, &self.l2_struct_id),
        ]
    }
}

impl Record for FailureEffect {
    const KIND: EntityKind = EntityKind::FailureEffect;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![ForeignKey::new(
            "l1FuncId",
            EntityKind::L1Function,
            &self.l1_func_id,
        )]
    }
}

impl Record for FailureMode {
    const KIND: EntityKind = EntityKind::FailureMode;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![
            ForeignKey::new("l2FuncId", EntityKind::L2Function, &self.l2_func_id),
            ForeignKey::new("l2StructId", EntityKind::L2Structure, &self.l2_struct_id),
        ]
    }
}

impl Record for FailureCause {
    const KIND: EntityKind = EntityKind::FailureCause;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![
            ForeignKey::new("l3FuncId", EntityKind::L3Function, &self.l3_func_id),
            ForeignKey::new("l3StructId", EntityKind::L3Structure, &self.l3_struct_id),
            ForeignKey::new("l2StructId", EntityKind::L2Structure, &self.l2_struct_id),
        ]
    }
}

impl Record for FailureLink {
    const KIND: EntityKind = EntityKind::FailureLink;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![
            ForeignKey::new("fmId", EntityKind::FailureMode, &self.fm_id),
            ForeignKey::new("feId", EntityKind::FailureEffect, &self.fe_id),
            ForeignKey::new("fcId", EntityKind::FailureCause, &self.fc_id),
        ]
    }
}

impl Record for FailureAnalysis {
    const KIND: EntityKind = EntityKind::FailureAnalysis;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![ForeignKey::new("linkId", EntityKind::FailureLink, &self.link_id)]
    }
}

impl Record for RiskAnalysis {
    const KIND: EntityKind = EntityKind::RiskAnalysis;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![ForeignKey::new("linkId", EntityKind::FailureLink, &self.link_id)]
    }
}

impl Record for Optimization {
    const KIND: EntityKind = EntityKind::Optimization;

    fn id(&self) -> &str {
        &self.id
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        vec![ForeignKey::new("riskId", EntityKind::RiskAnalysis, &self.risk_id)]
    }
}

impl Record for ConfirmedState {
    const KIND: EntityKind = EntityKind::ConfirmedState;

    /// Keyed by the analysis itself
    fn id(&self) -> &str {
        self.fmea_id.as_str()
    }

    fn fmea_id(&self) -> &AnalysisKey {
        &self.fmea_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_effect_parses_camel_case_and_normalizes_key() {
        let fe: FailureEffect = serde_json::from_value(json!({
            "id": "FE-1",
            "fmeaId": "pfm-01",
            "l1FuncId": "REQ-1",
            "category": "Your Plant",
            "effect": "Stop Function Loss",
            "severity": 9
        }))
        .unwrap();

        assert_eq!(fe.fmea_id.as_str(), "PFM-01");
        assert_eq!(fe.severity.map(Rating::get), Some(9));
        assert_eq!(
            fe.foreign_keys(),
            vec![ForeignKey::new("l1FuncId", EntityKind::L1Function, "REQ-1")]
        );
    }

    #[test]
    fn test_failure_cause_rejects_out_of_range_occurrence() {
        let parsed = serde_json::from_value::<FailureCause>(json!({
            "id": "FC-1",
            "fmeaId": "PFM-01",
            "l3FuncId": "PC-1",
            "l3StructId": "WE-1",
            "l2StructId": "P-1",
            "cause": "Tool Wear",
            "occurrence": 14
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_four_m_accepts_long_names() {
        let m: FourM = serde_json::from_str("\"Machine\"").unwrap();
        assert_eq!(m, FourM::Machine);
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"MC\"");
    }
}
