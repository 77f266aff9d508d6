//! Tests for the record-only job commands against an in-memory database.

use crate::cli::commands::{run_pause, run_resume, run_retry};
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::{Job, JobStatus, JobStore, QueueError};

async fn store_with(statuses: &[JobStatus]) -> (SqliteJobStore, Vec<i64>) {
    let store = SqliteJobStore::open_memory().await.unwrap();
    let mut ids = Vec::new();
    for (i, status) in statuses.iter().enumerate() {
        let mut job = Job::new(format!("https://example.com/{i}.bin"));
        job.status = *status;
        ids.push(store.insert(&job).await.unwrap());
    }
    (store, ids)
}

async fn status_of(store: &SqliteJobStore, id: i64) -> JobStatus {
    store.get(id).await.unwrap().unwrap().status
}

#[tokio::test]
async fn pause_leaves_other_downloading_jobs_alone() {
    let (store, ids) = store_with(&[JobStatus::Downloading, JobStatus::Pending]).await;
    run_pause(&store, ids[1]).await.unwrap();
    assert_eq!(status_of(&store, ids[1]).await, JobStatus::Paused);
    assert_eq!(status_of(&store, ids[0]).await, JobStatus::Downloading);

    run_resume(&store, ids[1]).await.unwrap();
    assert_eq!(status_of(&store, ids[1]).await, JobStatus::Pending);
    assert_eq!(status_of(&store, ids[0]).await, JobStatus::Downloading);
}

#[tokio::test]
async fn retry_requires_a_failed_job() {
    let (store, ids) = store_with(&[JobStatus::Failed, JobStatus::Completed]).await;
    run_retry(&store, ids[0]).await.unwrap();
    assert_eq!(status_of(&store, ids[0]).await, JobStatus::Pending);

    let err = run_retry(&store, ids[1]).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<QueueError>(),
        Some(QueueError::InvalidState { status: JobStatus::Completed, .. })
    ));
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let (store, _) = store_with(&[]).await;
    let err = run_pause(&store, 99).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<QueueError>(), Some(QueueError::NotFound(99))));
}
