//! Record ID generation
//!
//! IDs are minted outside storage so a record keeps the same ID in memory, in
//! the legacy tree and in the database. The kind prefix keeps IDs distinct
//! across entity types.
//!
//! Production saves use name-based (v5) UUIDs scoped to the analysis key, so a
//! node sent without an ID gets the same ID every time the same tree is saved.

use uuid::Uuid;

use crate::model::{AnalysisKey, EntityKind};

#[derive(Debug, Clone)]
enum Source {
    Sequential(u64),
    Derived { namespace: Uuid, minted: u64 },
}

/// Source of fresh record IDs
#[derive(Debug, Clone)]
pub struct IdMinter {
    source: Source,
}

impl IdMinter {
    /// Name-based IDs within one analysis (production)
    pub fn derived(key: &AnalysisKey) -> Self {
        Self {
            source: Source::Derived {
                namespace: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_str().as_bytes()),
                minted: 0,
            },
        }
    }

    /// Deterministic `PREFIX-0001` style IDs (tests, reproducible imports)
    pub fn sequential() -> Self {
        Self {
            source: Source::Sequential(0),
        }
    }

    /// Next ID of `kind`, derived from its position in the mint order
    pub fn mint(&mut self, kind: EntityKind) -> String {
        let ordinal = match &mut self.source {
            Source::Sequential(n) | Source::Derived { minted: n, .. } => {
                *n += 1;
                *n
            }
        };
        match &self.source {
            Source::Sequential(_) => format!("{}-{:04}", kind.id_prefix(), ordinal),
            Source::Derived { namespace, .. } => {
                let name = format!("{}#{}", kind.id_prefix(), ordinal);
                format!("{}-{}", kind.id_prefix(), Uuid::new_v5(namespace, name.as_bytes()))
            }
        }
    }

    /// ID of `kind` for a node identified by `seed` (parent path and text)
    ///
    /// Sequential minters ignore the seed.
    pub fn mint_for(&mut self, kind: EntityKind, seed: &str) -> String {
        if let Source::Derived { namespace, .. } = &self.source {
            let name = format!("{}/{}", kind.id_prefix(), seed);
            return format!("{}-{}", kind.id_prefix(), Uuid::new_v5(namespace, name.as_bytes()));
        }
        self.mint(kind)
    }

    /// Keep `existing` when it is a usable ID, otherwise mint one
    pub fn keep_or_mint(&mut self, existing: &str, kind: EntityKind) -> String {
        if existing.trim().is_empty() {
            self.mint(kind)
        } else {
            existing.to_string()
        }
    }
}
