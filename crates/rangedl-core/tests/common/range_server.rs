//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a single static body. Responds to HEAD with Content-Length and
//! Accept-Ranges: bytes; responds to GET with Range with 206 Partial Content.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` header even if ranges work.
    pub advertise_ranges: bool,
    /// If true, every ranged GET gets 416 regardless of the requested range
    /// (simulates an origin that has stopped honoring Range entirely).
    pub always_range_not_satisfiable: bool,
    /// Drop the connection after writing this many body bytes, for the first
    /// `drop_after_bytes_request_count` requests that land in a given bucket.
    /// `None` disables injection.
    pub drop_after_bytes: Option<u64>,
    /// How many times to apply `drop_after_bytes` before serving normally.
    /// A retried segment resumes from an advancing offset, not its original
    /// start, so requests are bucketed by `start / drop_bucket_size` rather
    /// than by exact start — that keeps every retry of the same segment
    /// counted against the same budget.
    pub drop_after_bytes_request_count: u32,
    /// Bucket width for the counter above. Should match (or evenly divide)
    /// the planner's segment size so retries of one segment share a bucket.
    pub drop_bucket_size: u64,
    /// Raw `Content-Disposition` value to send on HEAD responses, if any.
    pub content_disposition: Option<&'static str>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            always_range_not_satisfiable: false,
            drop_after_bytes: None,
            drop_after_bytes_request_count: 0,
            drop_bucket_size: u64::MAX,
            content_disposition: None,
        }
    }
}

/// Shared handle onto the server's per-bucket request counter, used by tests
/// to assert how many times a given byte range was actually requested (e.g.
/// scenario 4's "exactly 4 requests per segment" assertion).
#[derive(Clone)]
pub struct RequestCounts(Arc<Mutex<HashMap<u64, u32>>>);

impl RequestCounts {
    pub fn for_bucket(&self, bucket: u64) -> u32 {
        self.0.lock().unwrap().get(&bucket).copied().unwrap_or(0)
    }
}

/// Starts a server in a background thread serving `body`. Returns the base URL
/// (e.g. "http://127.0.0.1:12345/"). The server runs until the process exits.
pub fn start(body: Vec<u8>) -> (String, RequestCounts) {
    start_with_options(body, RangeServerOptions::default())
}

/// Like `start` but allows customizing server behavior (HEAD blocked, ranges missing, etc.).
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> (String, RequestCounts) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let drop_counts: Arc<Mutex<HashMap<u64, u32>>> = Arc::new(Mutex::new(HashMap::new()));
    let counts_handle = RequestCounts(Arc::clone(&drop_counts));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let drop_counts = Arc::clone(&drop_counts);
            thread::spawn(move || handle(stream, &body, opts, &drop_counts));
        }
    });
    (format!("http://127.0.0.1:{}/", port), counts_handle)
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: RangeServerOptions,
    drop_counts: &Mutex<HashMap<u64, u32>>,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;
    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
            return;
        }
        let accept_ranges = if opts.advertise_ranges && opts.support_ranges {
            "Accept-Ranges: bytes\r\n"
        } else {
            ""
        };
        let content_disposition = match opts.content_disposition {
            Some(v) => format!("Content-Disposition: {v}\r\n"),
            None => String::new(),
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}{}\
\r\n",
            total, accept_ranges, content_disposition
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if method.eq_ignore_ascii_case("GET") {
        if opts.always_range_not_satisfiable && range.is_some() {
            let response = format!(
                "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Length: 0\r\nContent-Range: bytes */{}\r\n\r\n",
                total
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }
        let use_range = opts.support_ranges;
        let (status, range_header, slice) = if use_range {
            if let Some((start, end_incl)) = range {
            let start = start.min(total);
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl {
                (
                    "416 Range Not Satisfiable",
                    format!("bytes */{}", total),
                    &body[0..0],
                )
            } else {
                let start = start as usize;
                let end_excl = (end_incl + 1).min(total) as usize;
                let slice = body.get(start..end_excl).unwrap_or(&body[0..0]);
                (
                    "206 Partial Content",
                    format!("bytes {}-{}/{}", start, end_excl.saturating_sub(1), total),
                    slice,
                )
            }
            } else {
            (
                "200 OK",
                format!("bytes 0-{}/{}", total.saturating_sub(1), total),
                body,
            )
            }
        } else {
            (
                "200 OK",
                format!("bytes 0-{}/{}", total.saturating_sub(1), total),
                body,
            )
        };
        let accept_ranges = if opts.advertise_ranges && opts.support_ranges {
            "Accept-Ranges: bytes\r\n"
        } else {
            ""
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Range: {}\r\n{}\
\r\n",
            status, slice.len(), range_header, accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());

        if let Some(cutoff) = opts.drop_after_bytes {
            let range_start = range.map(|(s, _)| s).unwrap_or(0);
            let bucket = range_start / opts.drop_bucket_size.max(1);
            let attempt = {
                let mut counts = drop_counts.lock().unwrap();
                let entry = counts.entry(bucket).or_insert(0);
                *entry += 1;
                *entry
            };
            if attempt <= opts.drop_after_bytes_request_count {
                let cutoff = (cutoff as usize).min(slice.len());
                let _ = stream.write_all(&slice[..cutoff]);
                return;
            }
        }

        let _ = stream.write_all(slice);
        return;
    }
    let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
}

/// Returns (method, optional (start, end_inclusive) for Range: bytes=X-Y).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if value.to_lowercase().starts_with("bytes=") {
                    let part = value[6..].trim();
                    if let Some((a, b)) = part.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end = b.trim();
                        let end_incl = if end.is_empty() {
                            u64::MAX
                        } else {
                            end.parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, range)
}
