//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas and
//! creates every table idempotently, then stamps the schema version.

use crate::config::PersistenceConfig;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

/// Schema version written by this build
pub const SCHEMA_VERSION: i32 = 1;

/// Open (creating if needed) the worksheet database and bring its schema up to date
pub async fn init_database(db_path: &Path, settings: &PersistenceConfig) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(settings.busy_timeout());

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;
    stamp_schema_version(&pool).await?;

    info!(
        "Database busy timeout set to {} ms",
        settings.busy_timeout_ms
    );

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_projects_table(pool).await?;
    create_snapshots_table(pool).await?;

    create_structure_tables(pool).await?;
    create_function_tables(pool).await?;
    create_failure_tables(pool).await?;
    create_risk_tables(pool).await?;
    create_confirmed_states_table(pool).await?;

    Ok(())
}

/// Highest recorded schema version, `None` for an unstamped database
pub async fn schema_version(pool: &SqlitePool) -> Result<Option<i32>> {
    let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

async fn stamp_schema_version(pool: &SqlitePool) -> Result<()> {
    match schema_version(pool).await? {
        None => {
            sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
                .bind(SCHEMA_VERSION)
                .execute(pool)
                .await?;
            info!("✓ Schema v{} recorded", SCHEMA_VERSION);
        }
        Some(version) if version > SCHEMA_VERSION => {
            warn!(
                "Database schema version ({}) is newer than code version ({})",
                version, SCHEMA_VERSION
            );
        }
        Some(version) => info!("Database schema is up to date (v{})", version),
    }
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Analysis registry; every other table cascades from it
async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_projects (
            fmea_id TEXT PRIMARY KEY,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Last saved legacy tree per analysis, stored as JSON
async fn create_snapshots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_legacy_snapshots (
            fmea_id TEXT PRIMARY KEY REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            document TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_structure_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_l1_structures (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            confirmed INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_l2_structures (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            l1_id TEXT NOT NULL,
            no TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT '',
            sort_order INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_l3_structures (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            l1_id TEXT NOT NULL,
            l2_id TEXT NOT NULL,
            m4 TEXT,
            name TEXT NOT NULL DEFAULT '',
            sort_order INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_function_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_l1_functions (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            l1_struct_id TEXT NOT NULL,
            category TEXT NOT NULL,
            function_name TEXT NOT NULL DEFAULT '',
            requirement TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_l2_functions (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            l2_struct_id TEXT NOT NULL,
            function_name TEXT NOT NULL DEFAULT '',
            product_char TEXT NOT NULL DEFAULT '',
            special_char TEXT,
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_l3_functions (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            l3_struct_id TEXT NOT NULL,
            l2_struct_id TEXT NOT NULL,
            function_name TEXT NOT NULL DEFAULT '',
            process_char TEXT NOT NULL DEFAULT '',
            special_char TEXT,
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_failure_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_failure_effects (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            l1_func_id TEXT NOT NULL,
            category TEXT NOT NULL,
            effect TEXT NOT NULL DEFAULT '',
            severity INTEGER CHECK (severity BETWEEN 1 AND 10),
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_failure_modes (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            l2_func_id TEXT NOT NULL,
            l2_struct_id TEXT NOT NULL,
            mode TEXT NOT NULL DEFAULT '',
            special_char INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_failure_causes (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            l3_func_id TEXT NOT NULL,
            l3_struct_id TEXT NOT NULL,
            l2_struct_id TEXT NOT NULL,
            cause TEXT NOT NULL DEFAULT '',
            occurrence INTEGER CHECK (occurrence BETWEEN 1 AND 10),
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Link identity is the FM/FE/FC triple
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_failure_links (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            fm_id TEXT NOT NULL,
            fe_id TEXT NOT NULL,
            fc_id TEXT NOT NULL,
            PRIMARY KEY (fmea_id, id),
            UNIQUE (fmea_id, fm_id, fe_id, fc_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Denormalized display rows; the full record is kept as JSON
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_failure_analyses (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            link_id TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_risk_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_risk_analyses (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            link_id TEXT NOT NULL,
            severity INTEGER CHECK (severity BETWEEN 1 AND 10),
            occurrence INTEGER CHECK (occurrence BETWEEN 1 AND 10),
            detection INTEGER CHECK (detection BETWEEN 1 AND 10),
            ap TEXT,
            prevention_control TEXT NOT NULL DEFAULT '',
            detection_control TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_optimizations (
            fmea_id TEXT NOT NULL REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            risk_id TEXT NOT NULL,
            recommended_action TEXT NOT NULL DEFAULT '',
            responsible TEXT NOT NULL DEFAULT '',
            target_date TEXT,
            new_severity INTEGER CHECK (new_severity BETWEEN 1 AND 10),
            new_occurrence INTEGER CHECK (new_occurrence BETWEEN 1 AND 10),
            new_detection INTEGER CHECK (new_detection BETWEEN 1 AND 10),
            new_ap TEXT,
            status TEXT NOT NULL DEFAULT 'open',
            remarks TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (fmea_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_confirmed_states_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fmea_confirmed_states (
            fmea_id TEXT PRIMARY KEY REFERENCES fmea_projects(fmea_id) ON DELETE CASCADE ON UPDATE CASCADE,
            seq INTEGER NOT NULL DEFAULT 0,
            structure INTEGER NOT NULL DEFAULT 0,
            l1_function INTEGER NOT NULL DEFAULT 0,
            l2_function INTEGER NOT NULL DEFAULT 0,
            l3_function INTEGER NOT NULL DEFAULT 0,
            failure_l1 INTEGER NOT NULL DEFAULT 0,
            failure_l2 INTEGER NOT NULL DEFAULT 0,
            failure_l3 INTEGER NOT NULL DEFAULT 0,
            failure_link INTEGER NOT NULL DEFAULT 0,
            risk INTEGER NOT NULL DEFAULT 0,
            optimization INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
