//! The parallel ranged-fetch pipeline (spec sections 4.5/4.6/5).
//!
//! Scheduling model: a single libcurl multi handle drives all active
//! segment transfers from one blocking thread; the multi handle's
//! `perform`/`wait`/`messages` loop is the cooperative scheduler. The Job
//! Controller runs this from `tokio::task::spawn_blocking` so the async
//! runtime's own worker threads stay free regardless of `connections`.

mod handler;
mod run;

pub use handler::SegmentHandler;
pub use run::{download_segments, ProgressTick};
