//! Classify HTTP status and curl errors into retry policy error kinds.

use crate::retry::error::SegmentError;
use crate::retry::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
///
/// Every request this engine issues carries a `Range` header (section 4.5),
/// so a 200 here means the origin ignored it and sent the whole body instead
/// of the requested slice — caught before any bytes are trusted by
/// `SegmentHandler::check_content_range`, and retried rather than treated as
/// a hard failure, since the origin may honor the range on a later attempt.
/// 416 (Range Not Satisfiable) is likewise explicitly retryable (section 7):
/// an origin that rejects a ranged request may simply be having a bad
/// moment, and the Supervisor gives it up to the usual attempt budget before
/// giving up.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        200 | 416 => ErrorKind::RangeMismatch,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify a segment error into an ErrorKind for the Retry Supervisor.
pub fn classify(e: &SegmentError) -> ErrorKind {
    match e {
        SegmentError::Curl(ce) => classify_curl_error(ce),
        SegmentError::Http(code) => classify_http_status(*code),
        SegmentError::InvalidRangeResponse { .. } => ErrorKind::RangeMismatch,
        SegmentError::PartialTransfer { .. } => ErrorKind::Connection,
        SegmentError::Storage(_) => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(matches!(classify_http_status(500), ErrorKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), ErrorKind::Http5xx(502)));
    }

    #[test]
    fn http_4xx_other() {
        assert_eq!(classify_http_status(404), ErrorKind::Other);
        assert_eq!(classify_http_status(403), ErrorKind::Other);
    }

    #[test]
    fn http_416_range_not_satisfiable_is_retryable() {
        assert_eq!(classify_http_status(416), ErrorKind::RangeMismatch);
    }

    #[test]
    fn http_200_on_a_ranged_request_is_retryable() {
        assert_eq!(classify_http_status(200), ErrorKind::RangeMismatch);
    }

    #[test]
    fn storage_error_is_not_retried() {
        let e = SegmentError::Storage(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(classify(&e), ErrorKind::Other);
    }

    #[test]
    fn partial_transfer_is_retried_as_connection() {
        let e = SegmentError::PartialTransfer {
            expected: 100,
            received: 40,
        };
        assert_eq!(classify(&e), ErrorKind::Connection);
    }
}
