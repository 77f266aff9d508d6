//! SQLite-backed job store (sqlx).
//!
//! Fixed columns for everything the queue sorts or filters on; request
//! settings (digests, headers, cookies, metadata) live in `settings_json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};

use super::{Job, JobId, JobSettings, JobStatus, JobStore};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len() + 16);
    out.push_str("sqlite://");
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    out.push_str("?mode=rwc");
    out
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    protocol TEXT NOT NULL DEFAULT '',
    output_path TEXT,
    total_size INTEGER NOT NULL DEFAULT 0,
    downloaded INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    added_at INTEGER NOT NULL,
    started_at INTEGER,
    finished_at INTEGER,
    error TEXT,
    settings_json TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS jobs_status ON jobs (status);
"#;

/// Handle to the job database. Cheap to clone.
///
/// Default location: `~/.local/state/rangedl/jobs.db`.
#[derive(Clone, Debug)]
pub struct SqliteJobStore {
    pool: Pool<Sqlite>,
}

impl SqliteJobStore {
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("rangedl")?;
        Ok(xdg_dirs.get_state_home().join("rangedl").join("jobs.db"))
    }

    /// Open (or create) the default job database and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(Self::default_path()?).await
    }

    /// Open (or create) the database at `path`, creating parent dirs.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&path_to_sqlite_uri(path))
            .await
            .with_context(|| format!("open job db {}", path.display()))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory database; a single connection so every query sees the same data.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Every job including completed ones, oldest first.
    pub async fn list_all(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(job_from_row).collect()
    }

    pub async fn get(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }
}

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let status_str: String = row.try_get("status")?;
    let status = JobStatus::parse(&status_str)
        .with_context(|| format!("unknown job status {status_str:?}"))?;
    let settings_json: String = row.try_get("settings_json")?;
    let settings: JobSettings = if settings_json.is_empty() {
        JobSettings::default()
    } else {
        serde_json::from_str(&settings_json).context("decode settings_json")?
    };
    let output: Option<String> = row.try_get("output_path")?;
    let total_size: i64 = row.try_get("total_size")?;
    let downloaded: i64 = row.try_get("downloaded")?;
    Ok(Job {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        protocol: row.try_get("protocol")?,
        output: output.map(PathBuf::from),
        total_size: total_size.max(0) as u64,
        downloaded: downloaded.max(0) as u64,
        status,
        priority: row.try_get("priority")?,
        settings,
        added_at: row.try_get("added_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        error: row.try_get("error")?,
    })
}

fn output_str(job: &Job) -> Option<String> {
    job.output.as_ref().map(|p| p.to_string_lossy().into_owned())
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<JobId> {
        let settings_json = serde_json::to_string(&job.settings)?;
        let id = sqlx::query(
            r#"
            INSERT INTO jobs (
                url, protocol, output_path, total_size, downloaded, status,
                priority, added_at, started_at, finished_at, error, settings_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&job.url)
        .bind(&job.protocol)
        .bind(output_str(job))
        .bind(job.total_size as i64)
        .bind(job.downloaded as i64)
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(job.added_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.error)
        .bind(settings_json)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let settings_json = serde_json::to_string(&job.settings)?;
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET url = ?1,
                protocol = ?2,
                output_path = ?3,
                total_size = ?4,
                downloaded = ?5,
                status = ?6,
                priority = ?7,
                started_at = ?8,
                finished_at = ?9,
                error = ?10,
                settings_json = ?11
            WHERE id = ?12
            "#,
        )
        .bind(&job.url)
        .bind(&job.protocol)
        .bind(output_str(job))
        .bind(job.total_size as i64)
        .bind(job.downloaded as i64)
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.error)
        .bind(settings_json)
        .bind(job.id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            anyhow::bail!("job {} not found", job.id);
        }
        Ok(())
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_unfinished(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM jobs WHERE status != 'completed' ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(job_from_row).collect()
    }
}
