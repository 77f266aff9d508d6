//! Chunk planning.
//!
//! Splits a download of known size into contiguous, non-overlapping byte
//! ranges, each backed by its own partial file next to the output.

mod choose;
mod range;

pub use choose::choose_connections;
pub use range::{chunk_path, plan_chunks, ChunkInfo};
