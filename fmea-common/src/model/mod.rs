//! Atomic entity model
//!
//! One record type per table, each carrying the owning analysis key and its
//! foreign keys as plain string IDs. IDs are client-assignable, so the same ID
//! is valid in memory, in the legacy tree and in storage.

pub mod batch;
pub mod entities;
pub mod legacy;
pub mod rating;

pub use batch::{AtomicBatch, AtomicPayload};
pub use entities::*;
pub use legacy::LegacyDocument;
pub use rating::{ActionPriority, Rating};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Analysis key (`fmeaId`), normalized to uppercase
///
/// Normalization happens in the constructor and during deserialization, so two
/// keys differing only in case can never address different analyses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnalysisKey(String);

impl AnalysisKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::MalformedInput("missing analysis key".to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AnalysisKey {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        AnalysisKey::parse(&raw)
    }
}

impl From<AnalysisKey> for String {
    fn from(key: AnalysisKey) -> String {
        key.0
    }
}

impl fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every atomic record kind, declared in foreign-key dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    L1Structure,
    L2Structure,
    L3Structure,
    L1Function,
    L2Function,
    L3Function,
    FailureEffect,
    FailureMode,
    FailureCause,
    FailureLink,
    FailureAnalysis,
    RiskAnalysis,
    Optimization,
    ConfirmedState,
}

impl EntityKind {
    /// Parents before children
    pub const ALL: [EntityKind; 14] = [
        EntityKind::L1Structure,
        EntityKind::L2Structure,
        EntityKind::L3Structure,
        EntityKind::L1Function,
        EntityKind::L2Function,
        EntityKind::L3Function,
        EntityKind::FailureEffect,
        EntityKind::FailureMode,
        EntityKind::FailureCause,
        EntityKind::FailureLink,
        EntityKind::FailureAnalysis,
        EntityKind::RiskAnalysis,
        EntityKind::Optimization,
        EntityKind::ConfirmedState,
    ];

    /// Storage table name
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::L1Structure => "fmea_l1_structures",
            EntityKind::L2Structure => "fmea_l2_structures",
            EntityKind::L3Structure => "fmea_l3_structures",
            EntityKind::L1Function => "fmea_l1_functions",
            EntityKind::L2Function => "fmea_l2_functions",
            EntityKind::L3Function => "fmea_l3_functions",
            EntityKind::FailureEffect => "fmea_failure_effects",
            EntityKind::FailureMode => "fmea_failure_modes",
            EntityKind::FailureCause => "fmea_failure_causes",
            EntityKind::FailureLink => "fmea_failure_links",
            EntityKind::FailureAnalysis => "fmea_failure_analyses",
            EntityKind::RiskAnalysis => "fmea_risk_analyses",
            EntityKind::Optimization => "fmea_optimizations",
            EntityKind::ConfirmedState => "fmea_confirmed_states",
        }
    }

    /// Prefix for generated IDs; keeps IDs distinct across kinds
    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::L1Structure => "L1",
            EntityKind::L2Structure => "L2",
            EntityKind::L3Structure => "L3",
            EntityKind::L1Function => "F1",
            EntityKind::L2Function => "F2",
            EntityKind::L3Function => "F3",
            EntityKind::FailureEffect => "FE",
            EntityKind::FailureMode => "FM",
            EntityKind::FailureCause => "FC",
            EntityKind::FailureLink => "LK",
            EntityKind::FailureAnalysis => "FA",
            EntityKind::RiskAnalysis => "RA",
            EntityKind::Optimization => "OP",
            EntityKind::ConfirmedState => "CS",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One declared foreign key of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey<'a> {
    /// Wire field name (e.g. `l1FuncId`)
    pub field: &'static str,
    pub target: EntityKind,
    pub value: &'a str,
}

impl<'a> ForeignKey<'a> {
    pub fn new(field: &'static str, target: EntityKind, value: &'a str) -> Self {
        Self { field, target, value }
    }
}

/// Common surface of every atomic record
pub trait Record {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn fmea_id(&self) -> &AnalysisKey;

    fn foreign_keys(&self) -> Vec<ForeignKey<'_>> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_key_normalizes_case() {
        let a = AnalysisKey::parse(" pfm26-m001 ").unwrap();
        let b = AnalysisKey::parse("PFM26-M001").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "PFM26-M001");
    }

    #[test]
    fn test_analysis_key_rejects_blank() {
        assert!(matches!(
            AnalysisKey::parse("   "),
            Err(Error::MalformedInput(_))
        ));
        assert!(serde_json::from_str::<AnalysisKey>("\"\"").is_err());
    }

    #[test]
    fn test_kind_order_is_dependency_order() {
        assert_eq!(EntityKind::ALL.first(), Some(&EntityKind::L1Structure));
        assert!(EntityKind::FailureMode < EntityKind::FailureLink);
        assert!(EntityKind::RiskAnalysis < EntityKind::Optimization);
    }
}
