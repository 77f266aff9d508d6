//! Job queue and scheduler.
//!
//! Jobs wait in a priority-ordered pending list (higher priority first, ties
//! in arrival order). A tick-driven loop starts pending jobs while fewer than
//! `max_active_jobs` are downloading; each job's blocking download runs on the
//! tokio blocking pool and reports progress back into the job record.

mod execute;
mod queue;
mod run;

pub use queue::{JobQueue, QueueStats};
