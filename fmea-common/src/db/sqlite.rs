//! SQLite worksheet store
//!
//! One table per entity kind, keyed by `(fmea_id, id)`. A `seq` column keeps
//! batch order so a load returns records in the order they were saved.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::types::Json;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};

use super::store::{AnalysisSummary, CommitPlan, WorksheetStore};
use crate::model::*;
use crate::{Error, Result};

type InsertQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Row mapping for one entity table
trait SqlRecord: Record + Sized + Send + Sync {
    const INSERT: &'static str;

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_>;

    fn from_row(row: &SqliteRow) -> Result<Self>;
}

fn key_of(row: &SqliteRow) -> Result<AnalysisKey> {
    AnalysisKey::parse(&row.try_get::<String, _>("fmea_id")?)
}

fn rating_of(row: &SqliteRow, column: &str) -> Result<Option<Rating>> {
    let value: Option<i64> = row.try_get(column)?;
    value
        .map(Rating::new)
        .transpose()
        .map_err(|e| Error::Internal(format!("stored {}: {}", column, e)))
}

fn raw_rating(rating: Option<Rating>) -> Option<i64> {
    rating.map(|r| i64::from(r.get()))
}

fn code_of<T>(row: &SqliteRow, column: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    let code: String = row.try_get(column)?;
    parse(&code).ok_or_else(|| Error::Internal(format!("unknown {} code '{}'", column, code)))
}

fn optional_code_of<T>(
    row: &SqliteRow,
    column: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>> {
    let code: Option<String> = row.try_get(column)?;
    code.map(|c| {
        parse(&c).ok_or_else(|| Error::Internal(format!("unknown {} code '{}'", column, c)))
    })
    .transpose()
}

impl SqlRecord for L1Structure {
    const INSERT: &'static str =
        "INSERT INTO fmea_l1_structures (fmea_id, id, seq, name, confirmed) VALUES (?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.name.as_str())
            .bind(self.confirmed)
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            name: row.try_get("name")?,
            confirmed: row.try_get("confirmed")?,
        })
    }
}

impl SqlRecord for L2Structure {
    const INSERT: &'static str = "INSERT INTO fmea_l2_structures (fmea_id, id, seq, l1_id, no, name, sort_order) VALUES (?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.l1_id.as_str())
            .bind(self.no.as_str())
            .bind(self.name.as_str())
            .bind(self.order)
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            l1_id: row.try_get("l1_id")?,
            no: row.try_get("no")?,
            name: row.try_get("name")?,
            order: row.try_get("sort_order")?,
        })
    }
}

impl SqlRecord for L3Structure {
    const INSERT: &'static str = "INSERT INTO fmea_l3_structures (fmea_id, id, seq, l1_id, l2_id, m4, name, sort_order) VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.l1_id.as_str())
            .bind(self.l2_id.as_str())
            .bind(self.m4.map(FourM::code))
            .bind(self.name.as_str())
            .bind(self.order)
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            l1_id: row.try_get("l1_id")?,
            l2_id: row.try_get("l2_id")?,
            m4: optional_code_of(row, "m4", FourM::from_code)?,
            name: row.try_get("name")?,
            order: row.try_get("sort_order")?,
        })
    }
}

impl SqlRecord for L1Function {
    const INSERT: &'static str = "INSERT INTO fmea_l1_functions (fmea_id, id, seq, l1_struct_id, category, function_name, requirement) VALUES (?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.l1_struct_id.as_str())
            .bind(self.category.code())
            .bind(self.function_name.as_str())
            .bind(self.requirement.as_str())
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            l1_struct_id: row.try_get("l1_struct_id")?,
            category: code_of(row, "category", L1Category::from_code)?,
            function_name: row.try_get("function_name")?,
            requirement: row.try_get("requirement")?,
        })
    }
}

impl SqlRecord for L2Function {
    const INSERT: &'static str = "INSERT INTO fmea_l2_functions (fmea_id, id, seq, l2_struct_id, function_name, product_char, special_char) VALUES (?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.l2_struct_id.as_str())
            .bind(self.function_name.as_str())
            .bind(self.product_char.as_str())
            .bind(self.special_char.as_deref())
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            l2_struct_id: row.try_get("l2_struct_id")?,
            function_name: row.try_get("function_name")?,
            product_char: row.try_get("product_char")?,
            special_char: row.try_get("special_char")?,
        })
    }
}

impl SqlRecord for L3Function {
    const INSERT: &'static str = "INSERT INTO fmea_l3_functions (fmea_id, id, seq, l3_struct_id, l2_struct_id, function_name, process_char, special_char) VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.l3_struct_id.as_str())
            .bind(self.l2_struct_id.as_str())
            .bind(self.function_name.as_str())
            .bind(self.process_char.as_str())
            .bind(self.special_char.as_deref())
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            l3_struct_id: row.try_get("l3_struct_id")?,
            l2_struct_id: row.try_get("l2_struct_id")?,
            function_name: row.try_get("function_name")?,
            process_char: row.try_get("process_char")?,
            special_char: row.try_get("special_char")?,
        })
    }
}

impl SqlRecord for FailureEffect {
    const INSERT: &'static str = "INSERT INTO fmea_failure_effects (fmea_id, id, seq, l1_func_id, category, effect, severity) VALUES (?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.l1_func_id.as_str())
            .bind(self.category.code())
            .bind(self.effect.as_str())
            .bind(raw_rating(self.severity))
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            l1_func_id: row.try_get("l1_func_id")?,
            category: code_of(row, "category", L1Category::from_code)?,
            effect: row.try_get("effect")?,
            severity: rating_of(row, "severity")?,
        })
    }
}

impl SqlRecord for FailureMode {
    const INSERT: &'static str = "INSERT INTO fmea_failure_modes (fmea_id, id, seq, l2_func_id, l2_struct_id, mode, special_char) VALUES (?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.l2_func_id.as_str())
            .bind(self.l2_struct_id.as_str())
            .bind(self.mode.as_str())
            .bind(self.special_char)
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            l2_func_id: row.try_get("l2_func_id")?,
            l2_struct_id: row.try_get("l2_struct_id")?,
            mode: row.try_get("mode")?,
            special_char: row.try_get("special_char")?,
        })
    }
}

impl SqlRecord for FailureCause {
    const INSERT: &'static str = "INSERT INTO fmea_failure_causes (fmea_id, id, seq, l3_func_id, l3_struct_id, l2_struct_id, cause, occurrence) VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.l3_func_id.as_str())
            .bind(self.l3_struct_id.as_str())
            .bind(self.l2_struct_id.as_str())
            .bind(self.cause.as_str())
            .bind(raw_rating(self.occurrence))
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            l3_func_id: row.try_get("l3_func_id")?,
            l3_struct_id: row.try_get("l3_struct_id")?,
            l2_struct_id: row.try_get("l2_struct_id")?,
            cause: row.try_get("cause")?,
            occurrence: rating_of(row, "occurrence")?,
        })
    }
}

impl SqlRecord for FailureLink {
    const INSERT: &'static str = "INSERT INTO fmea_failure_links (fmea_id, id, seq, fm_id, fe_id, fc_id) VALUES (?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.fm_id.as_str())
            .bind(self.fe_id.as_str())
            .bind(self.fc_id.as_str())
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            fm_id: row.try_get("fm_id")?,
            fe_id: row.try_get("fe_id")?,
            fc_id: row.try_get("fc_id")?,
        })
    }
}

impl SqlRecord for FailureAnalysis {
    const INSERT: &'static str = "INSERT INTO fmea_failure_analyses (fmea_id, id, seq, link_id, data) VALUES (?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.link_id.as_str())
            .bind(Json(self))
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let Json(analysis): Json<FailureAnalysis> = row.try_get("data")?;
        Ok(analysis)
    }
}

impl SqlRecord for RiskAnalysis {
    const INSERT: &'static str = "INSERT INTO fmea_risk_analyses (fmea_id, id, seq, link_id, severity, occurrence, detection, ap, prevention_control, detection_control) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.link_id.as_str())
            .bind(raw_rating(self.severity))
            .bind(raw_rating(self.occurrence))
            .bind(raw_rating(self.detection))
            .bind(self.ap.map(ActionPriority::code))
            .bind(self.prevention_control.as_str())
            .bind(self.detection_control.as_str())
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            link_id: row.try_get("link_id")?,
            severity: rating_of(row, "severity")?,
            occurrence: rating_of(row, "occurrence")?,
            detection: rating_of(row, "detection")?,
            ap: optional_code_of(row, "ap", ActionPriority::from_code)?,
            prevention_control: row.try_get("prevention_control")?,
            detection_control: row.try_get("detection_control")?,
        })
    }
}

impl SqlRecord for Optimization {
    const INSERT: &'static str = "INSERT INTO fmea_optimizations (fmea_id, id, seq, risk_id, recommended_action, responsible, target_date, new_severity, new_occurrence, new_detection, new_ap, status, remarks) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(self.id.as_str())
            .bind(seq)
            .bind(self.risk_id.as_str())
            .bind(self.recommended_action.as_str())
            .bind(self.responsible.as_str())
            .bind(self.target_date)
            .bind(raw_rating(self.new_severity))
            .bind(raw_rating(self.new_occurrence))
            .bind(raw_rating(self.new_detection))
            .bind(self.new_ap.map(ActionPriority::code))
            .bind(self.status.code())
            .bind(self.remarks.as_str())
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            fmea_id: key_of(row)?,
            risk_id: row.try_get("risk_id")?,
            recommended_action: row.try_get("recommended_action")?,
            responsible: row.try_get("responsible")?,
            target_date: row.try_get("target_date")?,
            new_severity: rating_of(row, "new_severity")?,
            new_occurrence: rating_of(row, "new_occurrence")?,
            new_detection: rating_of(row, "new_detection")?,
            new_ap: optional_code_of(row, "new_ap", ActionPriority::from_code)?,
            status: code_of(row, "status", OptimizationStatus::from_code)?,
            remarks: row.try_get("remarks")?,
        })
    }
}

impl SqlRecord for ConfirmedState {
    const INSERT: &'static str = "INSERT INTO fmea_confirmed_states (fmea_id, seq, structure, l1_function, l2_function, l3_function, failure_l1, failure_l2, failure_l3, failure_link, risk, optimization) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

    fn bind_insert(&self, seq: i64) -> InsertQuery<'_> {
        sqlx::query(Self::INSERT)
            .bind(self.fmea_id.as_str())
            .bind(seq)
            .bind(self.structure)
            .bind(self.l1_function)
            .bind(self.l2_function)
            .bind(self.l3_function)
            .bind(self.failure_l1)
            .bind(self.failure_l2)
            .bind(self.failure_l3)
            .bind(self.failure_link)
            .bind(self.risk)
            .bind(self.optimization)
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            fmea_id: key_of(row)?,
            structure: row.try_get("structure")?,
            l1_function: row.try_get("l1_function")?,
            l2_function: row.try_get("l2_function")?,
            l3_function: row.try_get("l3_function")?,
            failure_l1: row.try_get("failure_l1")?,
            failure_l2: row.try_get("failure_l2")?,
            failure_l3: row.try_get("failure_l3")?,
            failure_link: row.try_get("failure_link")?,
            risk: row.try_get("risk")?,
            optimization: row.try_get("optimization")?,
        })
    }
}

/// Worksheet store backed by a SQLite pool from [`super::init_database`]
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn fetch_all<T: SqlRecord>(conn: &mut SqliteConnection, key: &AnalysisKey) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT * FROM {} WHERE fmea_id = ? ORDER BY seq",
        T::KIND.table()
    );
    let rows = sqlx::query(&sql)
        .bind(key.as_str())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(T::from_row).collect()
}

async fn project_exists(conn: &mut SqliteConnection, key: &AnalysisKey) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM fmea_projects WHERE fmea_id = ?)")
            .bind(key.as_str())
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

async fn insert_all<T: SqlRecord>(
    tx: &mut Transaction<'_, Sqlite>,
    records: &[T],
) -> Result<()> {
    for (seq, record) in records.iter().enumerate() {
        record.bind_insert(seq as i64).execute(&mut **tx).await?;
    }
    Ok(())
}

async fn insert_kind(
    tx: &mut Transaction<'_, Sqlite>,
    batch: &AtomicBatch,
    kind: EntityKind,
) -> Result<()> {
    match kind {
        EntityKind::L1Structure => insert_all(tx, batch.l1_structure.as_slice()).await,
        EntityKind::L2Structure => insert_all(tx, &batch.l2_structures).await,
        EntityKind::L3Structure => insert_all(tx, &batch.l3_structures).await,
        EntityKind::L1Function => insert_all(tx, &batch.l1_functions).await,
        EntityKind::L2Function => insert_all(tx, &batch.l2_functions).await,
        EntityKind::L3Function => insert_all(tx, &batch.l3_functions).await,
        EntityKind::FailureEffect => insert_all(tx, &batch.failure_effects).await,
        EntityKind::FailureMode => insert_all(tx, &batch.failure_modes).await,
        EntityKind::FailureCause => insert_all(tx, &batch.failure_causes).await,
        EntityKind::FailureLink => insert_all(tx, &batch.failure_links).await,
        EntityKind::FailureAnalysis => insert_all(tx, &batch.failure_analyses).await,
        EntityKind::RiskAnalysis => insert_all(tx, &batch.risk_analyses).await,
        EntityKind::Optimization => insert_all(tx, &batch.optimizations).await,
        EntityKind::ConfirmedState => insert_all(tx, batch.confirmed.as_slice()).await,
    }
}

#[async_trait]
impl WorksheetStore for SqliteStore {
    async fn load_batch(&self, key: &AnalysisKey) -> Result<Option<AtomicBatch>> {
        // One read transaction so a concurrent commit is seen whole or not at all
        let mut tx = self.pool.begin().await?;
        if !project_exists(&mut tx, key).await? {
            return Ok(None);
        }

        let mut batch = AtomicBatch::new(key.clone());
        batch.l1_structure = fetch_all::<L1Structure>(&mut tx, key).await?.into_iter().next();
        batch.l2_structures = fetch_all(&mut tx, key).await?;
        batch.l3_structures = fetch_all(&mut tx, key).await?;
        batch.l1_functions = fetch_all(&mut tx, key).await?;
        batch.l2_functions = fetch_all(&mut tx, key).await?;
        batch.l3_functions = fetch_all(&mut tx, key).await?;
        batch.failure_effects = fetch_all(&mut tx, key).await?;
        batch.failure_modes = fetch_all(&mut tx, key).await?;
        batch.failure_causes = fetch_all(&mut tx, key).await?;
        batch.failure_links = fetch_all(&mut tx, key).await?;
        batch.failure_analyses = fetch_all(&mut tx, key).await?;
        batch.risk_analyses = fetch_all(&mut tx, key).await?;
        batch.optimizations = fetch_all(&mut tx, key).await?;
        batch.confirmed = fetch_all::<ConfirmedState>(&mut tx, key)
            .await?
            .into_iter()
            .next();
        tx.commit().await?;

        debug!(
            "Loaded {} records for analysis {}",
            batch.record_count(),
            key
        );
        Ok(Some(batch))
    }

    async fn load_snapshot(&self, key: &AnalysisKey) -> Result<Option<LegacyDocument>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM fmea_legacy_snapshots WHERE fmea_id = ?")
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await?;

        document
            .map(|json| serde_json::from_str(&json).map_err(Error::from))
            .transpose()
    }

    async fn commit(&self, plan: CommitPlan) -> Result<()> {
        let CommitPlan {
            key,
            replace,
            batch,
            snapshot,
        } = plan;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO fmea_projects (fmea_id, created_at, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(fmea_id) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Children first, so a future inter-table constraint never trips mid-swap
        for kind in replace.iter().rev() {
            let sql = format!("DELETE FROM {} WHERE fmea_id = ?", kind.table());
            sqlx::query(&sql)
                .bind(key.as_str())
                .execute(&mut *tx)
                .await?;
        }

        for kind in EntityKind::ALL {
            if replace.contains(&kind) {
                insert_kind(&mut tx, &batch, kind).await?;
            }
        }

        if let Some(snapshot) = &snapshot {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO fmea_legacy_snapshots (fmea_id, document, updated_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(key.as_str())
            .bind(serde_json::to_string(snapshot)?)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "Committed analysis {}: {} kinds replaced, {} records",
            key,
            replace.len(),
            batch.record_count()
        );
        Ok(())
    }

    async fn delete_analysis(&self, key: &AnalysisKey) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM fmea_projects WHERE fmea_id = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted > 0 {
            info!("Deleted analysis {}", key);
        }
        Ok(deleted > 0)
    }

    async fn list_analyses(&self) -> Result<Vec<AnalysisSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT p.fmea_id, COALESCE(s.name, '') AS name, p.updated_at
            FROM fmea_projects p
            LEFT JOIN fmea_l1_structures s ON s.fmea_id = p.fmea_id
            ORDER BY p.fmea_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AnalysisSummary {
                    fmea_id: key_of(row)?,
                    name: row.try_get("name")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }
}
