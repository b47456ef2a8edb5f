//! Job Descriptor and derived paths (spec section 3/4.1).

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::storage;
use crate::url_model;

/// Immutable-except-for-`file_name` description of a single download.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub url: String,
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    pub job_id: String,
    pub connections: u32,
    pub file_name: String,
    /// Set by [`with_file_name`](Self::with_file_name); stops Probe's
    /// Content-Disposition from overriding a name the caller chose (section
    /// 4.1's priority order ranks caller-supplied names above all others).
    file_name_explicit: bool,
    /// Zero means "unknown, probe for it". Non-zero bypasses Probe (resume path).
    pub total_bytes: u64,
    /// Resume progress per segment; empty means "fresh start".
    pub downloaded_bytes_per_chunk: Vec<u64>,
}

/// Paths derived from a [`JobDescriptor`]; recomputed whenever `file_name`
/// changes (see [`JobDescriptor::update_paths`]).
#[derive(Debug, Clone)]
pub struct DerivedPaths {
    pub final_path: PathBuf,
    pub temp_path: PathBuf,
    pub state_path: PathBuf,
}

impl JobDescriptor {
    /// Constructs a fresh job descriptor. `file_name`, if empty, is derived
    /// later from the URL and refined once more after Probe (section 4.1).
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        let url = url.into();
        let file_name = url_model::derive_filename(&url, None);
        Self {
            url,
            output_dir: output_dir.into(),
            state_dir: PathBuf::new(),
            job_id: generate_job_id(),
            connections: 8,
            file_name,
            file_name_explicit: false,
            total_bytes: 0,
            downloaded_bytes_per_chunk: Vec::new(),
        }
    }

    pub fn with_connections(mut self, connections: u32) -> Self {
        self.connections = connections.max(1);
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self.file_name_explicit = true;
        self
    }

    /// `state_dir` defaults to `output_dir` when unset, per the configuration
    /// table in section 6.
    pub fn effective_state_dir(&self) -> PathBuf {
        if self.state_dir.as_os_str().is_empty() {
            self.output_dir.clone()
        } else {
            self.state_dir.clone()
        }
    }

    /// Refines `file_name` from a server-supplied Content-Disposition header,
    /// applying the same priority order and sanitization as [`url_model::derive_filename`].
    /// No-op if `file_name` was explicitly pre-set by the caller before `start`
    /// and a Content-Disposition candidate is absent.
    pub fn refine_file_name(&mut self, content_disposition: Option<&str>) {
        if self.file_name_explicit {
            return;
        }
        if let Some(cd) = content_disposition {
            let candidate = url_model::derive_filename(&self.url, Some(cd));
            if candidate != url_model::DEFAULT_FILENAME {
                self.file_name = candidate;
            }
        }
    }

    pub fn derived_paths(&self) -> DerivedPaths {
        let final_path = self.output_dir.join(&self.file_name);
        let temp_path = storage::temp_path(&final_path);
        let state_path = self.effective_state_dir().join(format!("{}.json", self.job_id));
        DerivedPaths {
            final_path,
            temp_path,
            state_path,
        }
    }
}

fn generate_job_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("job-{:x}", nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_use_part_suffix() {
        let job = JobDescriptor::new("https://example.com/archive.zip", "/tmp/out")
            .with_job_id("abc");
        let paths = job.derived_paths();
        assert_eq!(paths.final_path, PathBuf::from("/tmp/out/archive.zip"));
        assert_eq!(paths.temp_path, PathBuf::from("/tmp/out/archive.zip.part"));
        assert_eq!(paths.state_path, PathBuf::from("/tmp/out/abc.json"));
    }

    #[test]
    fn state_dir_defaults_to_output_dir() {
        let job = JobDescriptor::new("https://example.com/x", "/tmp/out").with_job_id("j1");
        assert_eq!(job.effective_state_dir(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn state_dir_override_is_honored() {
        let job = JobDescriptor::new("https://example.com/x", "/tmp/out")
            .with_job_id("j1")
            .with_state_dir("/tmp/state");
        assert_eq!(job.effective_state_dir(), PathBuf::from("/tmp/state"));
    }

    #[test]
    fn refine_file_name_prefers_content_disposition() {
        let mut job = JobDescriptor::new("https://example.com/archive.zip", "/tmp/out");
        job.refine_file_name(Some("attachment; filename=\"report final.pdf\""));
        assert_eq!(job.file_name, "report_final.pdf");
    }

    #[test]
    fn refine_file_name_is_noop_when_caller_set_one_explicitly() {
        let mut job = JobDescriptor::new("https://example.com/archive.zip", "/tmp/out")
            .with_file_name("my-name.bin");
        job.refine_file_name(Some("attachment; filename=\"report final.pdf\""));
        assert_eq!(job.file_name, "my-name.bin");
    }

    #[test]
    fn refine_file_name_is_noop_for_explicit_name_even_with_bare_content_disposition() {
        let mut job = JobDescriptor::new("https://example.com/archive.zip", "/tmp/out")
            .with_file_name("my-name.bin");
        job.refine_file_name(Some("attachment"));
        assert_eq!(job.file_name, "my-name.bin");
    }
}
