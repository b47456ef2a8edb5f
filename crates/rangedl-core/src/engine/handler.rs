//! curl `Easy2` handler for a single segment transfer (spec section 4.5).

use std::cell::{Cell, RefCell};

use curl::easy::{Handler, WriteError};

use crate::progress::ProgressCounters;
use crate::retry::SegmentError;
use crate::segmenter::Segment;
use crate::storage::StorageWriter;

/// Per-attempt state for one segment's transfer. A fresh handler is built
/// for every retry attempt so byte counters and validation state start
/// clean; cumulative progress lives in the shared `counters` vector.
pub struct SegmentHandler {
    storage: StorageWriter,
    segment_index: usize,
    segment: Segment,
    write_pos: Cell<u64>,
    bytes_this_attempt: Cell<u64>,
    counters: ProgressCounters,
    header_lines: RefCell<Vec<String>>,
    error: RefCell<Option<SegmentError>>,
}

impl SegmentHandler {
    pub fn new(
        storage: StorageWriter,
        segment_index: usize,
        segment: Segment,
        resume_start: u64,
        counters: ProgressCounters,
    ) -> Self {
        Self {
            storage,
            segment_index,
            segment,
            write_pos: Cell::new(resume_start),
            bytes_this_attempt: Cell::new(0),
            counters,
            header_lines: RefCell::new(Vec::new()),
            error: RefCell::new(None),
        }
    }

    pub fn bytes_written_this_attempt(&self) -> u64 {
        self.bytes_this_attempt.get()
    }

    pub fn take_error(&self) -> Option<SegmentError> {
        self.error.borrow_mut().take()
    }

    fn expected_range_prefix(&self) -> String {
        format!("bytes {}-{}/", self.write_pos.get(), self.segment.end())
    }

    /// Checks the `Content-Range` header captured from the last response
    /// against the range this attempt actually asked for. Called by the
    /// event loop once curl reports the transfer finished with a 206
    /// (section 4.5: a disagreeing Content-Range is a retryable failure,
    /// not silent data corruption).
    pub fn check_content_range(&self) -> Result<(), SegmentError> {
        let headers = self.header_lines.borrow();
        let content_range = headers
            .iter()
            .find_map(|l| l.split_once(':').map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string())))
            .filter(|(n, _)| n == "content-range")
            .map(|(_, v)| v);

        match content_range {
            Some(cr) if cr.starts_with(&self.expected_range_prefix()) => Ok(()),
            other => Err(SegmentError::InvalidRangeResponse {
                expected: self.expected_range_prefix(),
                got: other,
            }),
        }
    }
}

impl Handler for SegmentHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(text) = std::str::from_utf8(data) {
            if text.starts_with("HTTP/") {
                self.header_lines.borrow_mut().clear();
            } else if !text.trim().is_empty() {
                self.header_lines.borrow_mut().push(text.trim_end().to_string());
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if self.error.borrow().is_some() {
            // A prior write already failed validation/storage; stop accepting bytes.
            return Ok(data.len());
        }

        match self.storage.write_at(self.write_pos.get(), data) {
            Ok(()) => {
                let len = data.len() as u64;
                self.write_pos.set(self.write_pos.get() + len);
                self.bytes_this_attempt.set(self.bytes_this_attempt.get() + len);
                self.counters.add(self.segment_index, len);
                Ok(data.len())
            }
            Err(e) => {
                *self.error.borrow_mut() = Some(SegmentError::Storage(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e.to_string(),
                )));
                Err(WriteError::Pause)
            }
        }
    }
}
