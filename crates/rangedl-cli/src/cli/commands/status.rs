//! `rangedl status` – list every job with queue totals.

use anyhow::Result;
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::{Job, JobStatus};

use super::progress::mib;

pub async fn run_status(store: &SqliteJobStore) -> Result<()> {
    let jobs = store.list_all().await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }
    println!(
        "{:<6} {:<12} {:>4} {:>10} {:>7} URL",
        "ID", "STATUS", "PRI", "SIZE", "DONE"
    );
    for j in &jobs {
        println!(
            "{:<6} {:<12} {:>4} {:>10} {:>7} {}",
            j.id,
            j.status,
            j.priority,
            size_column(j),
            percent_column(j),
            j.url
        );
        if let Some(err) = &j.error {
            println!("{:<6} error: {err}", "");
        }
    }
    let count = |s: JobStatus| jobs.iter().filter(|j| j.status == s).count();
    println!(
        "\n{} job(s): {} pending, {} downloading, {} paused, {} completed, {} failed",
        jobs.len(),
        count(JobStatus::Pending),
        count(JobStatus::Downloading),
        count(JobStatus::Paused),
        count(JobStatus::Completed),
        count(JobStatus::Failed),
    );
    Ok(())
}

fn size_column(j: &Job) -> String {
    if j.total_size == 0 {
        "-".to_string()
    } else {
        format!("{:.1}M", mib(j.total_size))
    }
}

fn percent_column(j: &Job) -> String {
    match j.status {
        JobStatus::Completed => "100%".to_string(),
        _ if j.total_size > 0 => format!("{:.0}%", j.downloaded as f64 * 100.0 / j.total_size as f64),
        _ => "-".to_string(),
    }
}
