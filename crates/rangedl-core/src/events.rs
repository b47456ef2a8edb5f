//! Observer-facing event stream.
//!
//! A tagged union, not a callback hierarchy: the caller receives a channel of
//! [`Event`] and matches on the variant. The Controller guarantees exactly one
//! `Start`, zero or more `Progress`, then exactly one of `Complete`, `Error`,
//! or `Paused` per job.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Event {
    Start {
        job_id: String,
        total_bytes: u64,
        file_name: String,
    },
    Progress {
        job_id: String,
        downloaded: u64,
        total: u64,
        speed_bps: f64,
    },
    Paused {
        job_id: String,
    },
    Complete {
        job_id: String,
        final_path: PathBuf,
    },
    Error {
        job_id: String,
        message: String,
    },
}

impl Event {
    pub fn job_id(&self) -> &str {
        match self {
            Event::Start { job_id, .. }
            | Event::Progress { job_id, .. }
            | Event::Paused { job_id }
            | Event::Complete { job_id, .. }
            | Event::Error { job_id, .. } => job_id,
        }
    }
}
