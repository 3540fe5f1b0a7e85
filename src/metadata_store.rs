//! Metadata store: schema lifecycle and per-file bookkeeping.
//!
//! The store connection is opened once at startup and owned here for the
//! process lifetime; every other part of the engine gets transactions
//! through [`MetadataStore::begin`]. Before any mover starts, [`bootstrap`]
//! brings the on-disk schema to the revision the running code expects:
//! a brand-new store gets the current schema created directly and stamped
//! at head (no incremental replay), an old store gets the ordered migration
//! steps applied one transaction at a time, and an up-to-date store is left
//! untouched.
//!
//! [`bootstrap`]: MetadataStore::bootstrap

use crate::config::DatabaseConfig;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Row, Sqlite, Transaction};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// One forward migration step. Statements run in a single transaction
/// together with the version-marker update, so a failed step leaves the
/// store at the previous revision.
pub struct Migration {
    pub revision: i64,
    pub statements: &'static [&'static str],
}

/// Ordered migration history, oldest first
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        revision: 1,
        statements: &[
            r#"
            CREATE TABLE files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                camera TEXT NOT NULL,
                category TEXT NOT NULL,
                subcategory TEXT NOT NULL,
                tier_path TEXT NOT NULL,
                rel_path TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX idx_files_camera ON files (camera, category, subcategory)",
        ],
    },
    Migration {
        revision: 2,
        statements: &["ALTER TABLE files ADD COLUMN action TEXT NOT NULL DEFAULT 'move'"],
    },
];

/// Schema as of the head revision, used for fresh installs
const CURRENT_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        camera TEXT NOT NULL,
        category TEXT NOT NULL,
        subcategory TEXT NOT NULL,
        tier_path TEXT NOT NULL,
        rel_path TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        recorded_at TEXT NOT NULL,
        action TEXT NOT NULL DEFAULT 'move'
    )
    "#,
    "CREATE INDEX idx_files_camera ON files (camera, category, subcategory)",
];

/// Head revision the running code expects
pub fn head_revision() -> i64 {
    MIGRATIONS.last().map(|m| m.revision).unwrap_or(0)
}

/// What a mover did to a file, as recorded in bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Move,
    Delete,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Move => "move",
            FileAction::Delete => "delete",
        }
    }
}

/// Bookkeeping row for one completed mover action
#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub camera: String,
    pub category: String,
    pub subcategory: String,
    pub tier_path: String,
    pub rel_path: String,
    pub size_bytes: i64,
    pub recorded_at: DateTime<Utc>,
    pub action: String,
}

/// Metadata store backed by SQLite through sqlx
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Open the store connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .context("Failed to connect to metadata store")?;

        info!(url = %config.url, "Connected to metadata store");

        Ok(Self { pool })
    }

    /// Bring the schema to the head revision. Runs exactly once at startup,
    /// before any mover; any failure here is fatal.
    pub async fn bootstrap(&self) -> Result<()> {
        self.bootstrap_with(MIGRATIONS).await
    }

    #[instrument(skip(self, migrations))]
    async fn bootstrap_with(&self, migrations: &[Migration]) -> Result<()> {
        let head = migrations.last().map(|m| m.revision).unwrap_or(0);

        match self.current_revision().await? {
            None => {
                debug!(head, "No recorded revision, creating new store");
                self.create_new_store(head).await
            }
            Some(recorded) if recorded < head => {
                warn!(recorded, head, "Upgrading metadata store, do not interrupt");
                self.run_migrations(recorded, migrations).await?;
                warn!(head, "Metadata store upgrade complete");
                Ok(())
            }
            Some(recorded) if recorded > head => {
                bail!(
                    "Metadata store revision {} is newer than expected head {}",
                    recorded,
                    head
                );
            }
            Some(recorded) => {
                debug!(recorded, "Metadata store schema is up to date");
                Ok(())
            }
        }
    }

    /// Recorded schema revision, or `None` for a store that has never
    /// been bootstrapped
    pub async fn current_revision(&self) -> Result<Option<i64>> {
        let table: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to inspect metadata store schema")?;

        if table.is_none() {
            return Ok(None);
        }

        let row = sqlx::query("SELECT revision FROM schema_version")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read schema revision")?;

        Ok(row.map(|r| r.get::<i64, _>(0)))
    }

    /// Create the current schema directly and stamp the store at head.
    /// Incremental migrations are not replayed on a brand-new store.
    async fn create_new_store(&self, head: i64) -> Result<()> {
        let mut tx = self.begin().await?;

        for statement in CURRENT_SCHEMA {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .context("Failed to create metadata store schema")?;
        }

        sqlx::query("CREATE TABLE schema_version (revision INTEGER NOT NULL)")
            .execute(&mut *tx)
            .await
            .context("Failed to create schema_version table")?;
        sqlx::query("INSERT INTO schema_version (revision) VALUES (?)")
            .bind(head)
            .execute(&mut *tx)
            .await
            .context("Failed to stamp schema revision")?;

        tx.commit().await.context("Failed to commit new schema")?;

        info!(revision = head, "Created new metadata store");
        Ok(())
    }

    /// Apply the migration steps above `recorded`, in order. Each step
    /// commits atomically with its version-marker update, so a failure
    /// leaves the marker at the last fully applied revision.
    async fn run_migrations(&self, recorded: i64, migrations: &[Migration]) -> Result<()> {
        for migration in migrations.iter().filter(|m| m.revision > recorded) {
            let mut tx = self.begin().await?;

            for statement in migration.statements {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| {
                        format!("Migration to revision {} failed", migration.revision)
                    })?;
            }

            sqlx::query("UPDATE schema_version SET revision = ?")
                .bind(migration.revision)
                .execute(&mut *tx)
                .await
                .with_context(|| {
                    format!("Failed to advance revision marker to {}", migration.revision)
                })?;

            tx.commit().await.with_context(|| {
                format!("Failed to commit migration to revision {}", migration.revision)
            })?;

            info!(revision = migration.revision, "Applied migration");
        }

        Ok(())
    }

    /// Begin a scoped transaction. Dropping the transaction without
    /// committing rolls it back, on every exit path.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin metadata store transaction")
    }

    /// Record a completed mover action in the bookkeeping table
    #[instrument(skip(self), fields(camera = %camera, rel_path = %rel_path))]
    pub async fn record_file_action(
        &self,
        camera: &str,
        category: &str,
        subcategory: &str,
        tier_path: &str,
        rel_path: &str,
        size_bytes: i64,
        action: FileAction,
    ) -> Result<i64> {
        let mut tx = self.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO files (
                camera, category, subcategory, tier_path,
                rel_path, size_bytes, recorded_at, action
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(camera)
        .bind(category)
        .bind(subcategory)
        .bind(tier_path)
        .bind(rel_path)
        .bind(size_bytes)
        .bind(Utc::now())
        .bind(action.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to insert file record")?;

        tx.commit().await.context("Failed to commit file record")?;

        Ok(result.last_insert_rowid())
    }

    /// Bookkeeping rows for one camera, newest first
    pub async fn camera_file_actions(&self, camera: &str) -> Result<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, camera, category, subcategory, tier_path,
                   rel_path, size_bytes, recorded_at, action
            FROM files
            WHERE camera = ?
            ORDER BY recorded_at DESC, id DESC
            "#,
        )
        .bind(camera)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query file records")?;

        Ok(records)
    }

    /// Close the pool. Called after all movers have stopped.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get the connection pool (for health checks)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
