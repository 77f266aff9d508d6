//! CLI for the rangedl download manager.

mod commands;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rangedl_core::checksum::{ExpectedDigests, HashAlgorithm};
use rangedl_core::config;
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::{EngineConfig, JobId};

use commands::{
    run_add, run_batch, run_get, run_pause, run_remove, run_resume, run_retry, run_scheduler,
    run_status, run_verify,
};

/// Top-level CLI for the rangedl download manager.
#[derive(Debug, Parser)]
#[command(name = "rangedl")]
#[command(about = "rangedl: multi-connection HTTP downloader with a job queue", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/rangedl/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Job database to use instead of ~/.local/state/rangedl/jobs.db.
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Per-request options shared by `get` and `add`.
#[derive(Debug, Clone, Default, Args)]
pub struct RequestArgs {
    /// Output file; derived from the URL under the download dir when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Number of parallel connections (chunks).
    #[arg(short = 'c', long, value_name = "N")]
    pub connections: Option<usize>,

    /// Expected SHA-256 of the finished file.
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Expected SHA-1 of the finished file.
    #[arg(long, value_name = "HEX")]
    pub sha1: Option<String>,

    /// Expected MD5 of the finished file.
    #[arg(long, value_name = "HEX")]
    pub md5: Option<String>,

    /// Extra request header, `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Cookie, `name=value`. Repeatable.
    #[arg(long = "cookie", value_name = "COOKIE")]
    pub cookies: Vec<String>,
}

impl RequestArgs {
    pub fn digests(&self) -> ExpectedDigests {
        ExpectedDigests {
            sha256: self.sha256.clone(),
            sha1: self.sha1.clone(),
            md5: self.md5.clone(),
        }
    }

    pub fn header_map(&self) -> BTreeMap<String, String> {
        self.headers.iter().cloned().collect()
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL now, without the job queue.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        #[command(flatten)]
        request: RequestArgs,

        /// Bandwidth cap in bytes per second (0 = unlimited).
        #[arg(long, value_name = "BYTES")]
        rate_limit: Option<i64>,
    },

    /// Download every URL listed in a file, bypassing the job queue.
    ///
    /// One URL per line, optionally followed by sha256:HEX, sha1:HEX or
    /// md5:HEX. Blank lines and lines starting with # are skipped.
    Batch {
        /// URL list file.
        file: PathBuf,

        /// Downloads to run at once.
        #[arg(short, long, default_value_t = 4, value_name = "N")]
        jobs: usize,

        /// Parallel connections (chunks) per download.
        #[arg(short = 'c', long, value_name = "N")]
        connections: Option<usize>,

        /// Bandwidth cap in bytes per second across the batch (0 = unlimited).
        #[arg(long, value_name = "BYTES")]
        rate_limit: Option<i64>,
    },

    /// Add a new download job to the queue.
    Add {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        #[command(flatten)]
        request: RequestArgs,

        /// Higher runs first.
        #[arg(short, long, default_value_t = 0)]
        priority: i32,
    },

    /// Run queued jobs until the queue is empty (Ctrl-C stops and keeps them queued).
    Run {
        /// Run up to N jobs at once (default from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,

        /// Bandwidth cap in bytes per second for this run (0 = unlimited).
        #[arg(long, value_name = "BYTES")]
        rate_limit: Option<i64>,
    },

    /// Show all jobs and queue totals.
    Status,

    /// Pause a pending job by its ID.
    Pause {
        /// Job identifier.
        id: JobId,
    },

    /// Resume a paused job by its ID.
    Resume {
        /// Job identifier.
        id: JobId,
    },

    /// Re-queue a failed job by its ID.
    Retry {
        /// Job identifier.
        id: JobId,
    },

    /// Remove a job by ID.
    Remove {
        /// Job identifier.
        id: JobId,

        /// Also delete the downloaded file.
        #[arg(long)]
        delete_file: bool,
    },

    /// Verify a file against expected digests, or print its SHA-256.
    Verify {
        /// Path to the file.
        path: PathBuf,

        /// Expected digest as ALGORITHM:HEX (SHA256, SHA1, MD5). Repeatable.
        #[arg(long = "expect", value_name = "ALG:HEX", value_parser = parse_expected)]
        expected: Vec<(HashAlgorithm, String)>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                request,
                rate_limit,
            } => run_get(cfg, &url, &request, rate_limit).await?,
            CliCommand::Batch {
                file,
                jobs,
                connections,
                rate_limit,
            } => run_batch(cfg, &file, jobs, connections, rate_limit).await?,
            CliCommand::Verify { path, expected } => run_verify(&path, &expected).await?,
            CliCommand::Add {
                url,
                request,
                priority,
            } => run_add(&*open_store(&cli.db).await?, &url, &request, priority).await?,
            CliCommand::Run { jobs, rate_limit } => {
                let cfg = with_overrides(cfg, jobs, rate_limit);
                run_scheduler(cfg, open_store(&cli.db).await?).await?
            }
            CliCommand::Status => run_status(&*open_store(&cli.db).await?).await?,
            CliCommand::Pause { id } => run_pause(&*open_store(&cli.db).await?, id).await?,
            CliCommand::Resume { id } => run_resume(&*open_store(&cli.db).await?, id).await?,
            CliCommand::Retry { id } => run_retry(&*open_store(&cli.db).await?, id).await?,
            CliCommand::Remove { id, delete_file } => {
                run_remove(&*open_store(&cli.db).await?, id, delete_file).await?
            }
        }

        Ok(())
    }
}

async fn open_store(path: &Option<PathBuf>) -> Result<Arc<SqliteJobStore>> {
    let store = match path {
        Some(p) => SqliteJobStore::open_at(p).await?,
        None => SqliteJobStore::open_default().await?,
    };
    Ok(Arc::new(store))
}

fn with_overrides(mut cfg: EngineConfig, jobs: Option<usize>, rate_limit: Option<i64>) -> EngineConfig {
    if let Some(n) = jobs {
        cfg.max_active_jobs = n.max(1);
    }
    if let Some(r) = rate_limit {
        cfg.rate_limit_bytes = r;
    }
    cfg
}

fn parse_header(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once(':')
        .with_context(|| format!("header {s:?} must look like `Name: value`"))?;
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "header {s:?} has an empty name");
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_expected(s: &str) -> Result<(HashAlgorithm, String)> {
    let (alg, hex) = s
        .split_once(':')
        .with_context(|| format!("expected digest {s:?} must look like ALG:HEX"))?;
    Ok((alg.parse()?, hex.trim().to_string()))
}

#[cfg(test)]
mod tests;
