//! State Persistor: the Resume Record (spec section 4.8 / 6).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::job::JobDescriptor;

/// Exact on-disk JSON shape. Field names match the wire contract in section 6
/// (`camelCase`), not Rust naming conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub url: String,
    #[serde(rename = "outputDir")]
    pub output_dir: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "totalBytes")]
    pub total_bytes: u64,
    #[serde(rename = "downloadedBytesPerChunk")]
    pub downloaded_bytes_per_chunk: Vec<u64>,
    #[serde(rename = "numConnections")]
    pub num_connections: u32,
    pub uuid: String,
    #[serde(rename = "stateDir")]
    pub state_dir: String,
}

impl ResumeRecord {
    pub fn from_job(job: &JobDescriptor, downloaded: Vec<u64>) -> Self {
        Self {
            url: job.url.clone(),
            output_dir: job.output_dir.to_string_lossy().into_owned(),
            file_name: job.file_name.clone(),
            total_bytes: job.total_bytes,
            downloaded_bytes_per_chunk: downloaded,
            num_connections: job.connections,
            uuid: job.job_id.clone(),
            state_dir: job.effective_state_dir().to_string_lossy().into_owned(),
        }
    }

    /// A record is corrupt, per section 9's resolved open question, if its
    /// chunk-progress vector length disagrees with `numConnections`.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.downloaded_bytes_per_chunk.len() != self.num_connections as usize {
            return Err(EngineError::CorruptResumeRecord(format!(
                "downloadedBytesPerChunk has {} entries, expected {}",
                self.downloaded_bytes_per_chunk.len(),
                self.num_connections
            )));
        }
        Ok(())
    }
}

/// Writes the resume record to `state_path`. Best-effort with respect to the
/// download pipeline's timing: callers should not block network progress on
/// this call taking unusually long, but the write itself is synchronous.
pub fn save(state_path: &Path, record: &ResumeRecord) -> Result<(), EngineError> {
    if let Some(parent) = state_path.parent() {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| EngineError::CorruptResumeRecord(e.to_string()))?;
    fs::write(state_path, json).map_err(|e| EngineError::io(state_path, e))?;
    Ok(())
}

/// Loads a resume record. A missing file is "no resume available", reported
/// as `Ok(None)` rather than an error. A present-but-unparseable or
/// structurally-invalid file is `Err(CorruptResumeRecord)` — callers should
/// treat that the same as "no resume available" and start fresh.
pub fn load(state_path: &Path) -> Result<Option<ResumeRecord>, EngineError> {
    let data = match fs::read_to_string(state_path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(EngineError::io(state_path, e)),
    };
    let record: ResumeRecord = serde_json::from_str(&data)
        .map_err(|e| EngineError::CorruptResumeRecord(e.to_string()))?;
    record.validate()?;
    Ok(Some(record))
}

/// Deletes the resume record on successful completion. Absence of the file
/// is the canonical "no resume pending" signal, so a missing file is not an
/// error here either.
pub fn delete(state_path: &Path) -> Result<(), EngineError> {
    match fs::remove_file(state_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EngineError::io(state_path, e)),
    }
}
