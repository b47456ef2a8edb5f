//! Probe (spec section 4.3): a single metadata request to obtain total size
//! and, optionally, a server-suggested file name.

use std::time::Duration;

use crate::error::EngineError;

#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    pub total_bytes: u64,
    pub content_disposition: Option<String>,
}

/// Issues a HEAD request against `url`, aborting after `deadline`. Falls back
/// to classifying transport failures and a missing/zero content-length as
/// section 7's error kinds.
pub fn probe(url: &str, deadline: Duration) -> Result<ProbeResult, EngineError> {
    let mut handle = curl::easy::Easy::new();
    handle
        .url(url)
        .map_err(|e| EngineError::PreconditionFailure(format!("invalid url: {e}")))?;
    handle
        .nobody(true)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    handle
        .connect_timeout(deadline)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    handle
        .timeout(deadline)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    handle
        .follow_location(true)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;

    let mut headers: Vec<String> = Vec::new();
    {
        let mut transfer = handle.transfer();
        transfer
            .header_function(|line| {
                if let Ok(text) = std::str::from_utf8(line) {
                    if text.starts_with("HTTP/") {
                        headers.clear();
                    }
                    headers.push(text.trim_end().to_string());
                }
                true
            })
            .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
        transfer
            .perform()
            .map_err(|e| classify_probe_transport_error(&e))?;
    }

    let status = handle
        .response_code()
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    if !(200..300).contains(&status) {
        return Err(EngineError::TransientNetworkFailure(format!(
            "probe received HTTP {status}"
        )));
    }

    let parsed = parse_headers(&headers);
    let total_bytes = parsed.content_length.ok_or_else(|| {
        EngineError::PreconditionFailure("server did not advertise a content length".to_string())
    })?;

    Ok(ProbeResult {
        total_bytes,
        content_disposition: parsed.content_disposition,
    })
}

fn classify_probe_transport_error(e: &curl::Error) -> EngineError {
    if e.is_operation_timedout() {
        EngineError::TransientNetworkFailure(format!("probe timed out: {e}"))
    } else {
        EngineError::TransientNetworkFailure(e.to_string())
    }
}

#[derive(Default)]
struct ParsedHeaders {
    content_length: Option<u64>,
    content_disposition: Option<String>,
}

fn parse_headers(lines: &[String]) -> ParsedHeaders {
    let mut parsed = ParsedHeaders::default();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            match name.as_str() {
                "content-length" => parsed.content_length = value.parse::<u64>().ok(),
                "content-disposition" => parsed.content_disposition = Some(value),
                _ => {}
            }
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_length_and_disposition() {
        let lines = vec![
            "HTTP/1.1 200 OK".to_string(),
            "Content-Length: 1000".to_string(),
            "Content-Disposition: attachment; filename=\"report.pdf\"".to_string(),
        ];
        let parsed = parse_headers(&lines);
        assert_eq!(parsed.content_length, Some(1000));
        assert_eq!(
            parsed.content_disposition.as_deref(),
            Some("attachment; filename=\"report.pdf\"")
        );
    }

    #[test]
    fn missing_content_length_is_none() {
        let lines = vec!["HTTP/1.1 200 OK".to_string()];
        let parsed = parse_headers(&lines);
        assert_eq!(parsed.content_length, None);
    }

    #[test]
    fn header_parsing_is_case_insensitive() {
        let lines = vec!["content-LENGTH: 42".to_string()];
        let parsed = parse_headers(&lines);
        assert_eq!(parsed.content_length, Some(42));
    }
}
