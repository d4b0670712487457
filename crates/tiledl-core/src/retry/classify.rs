//! Map fetch failures onto retry error kinds.
//!
//! Tile servers answer missing tiles (ocean, out of range) with 404 and
//! overload with 429/503, so only the latter and 5xx are worth retrying.

use crate::fetch::FetchError;
use crate::retry::policy::ErrorKind;

pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        408 => ErrorKind::Timeout,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        ErrorKind::Timeout
    } else if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_ssl_connect_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        ErrorKind::Connection
    } else {
        ErrorKind::Other
    }
}

/// An empty or non-image 200 body is treated as a broken tile, not a hiccup.
pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::EmptyBody | FetchError::Malformed(_) | FetchError::Aborted => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_statuses_are_throttled() {
        for code in [429, 503] {
            assert_eq!(classify_http_status(code), ErrorKind::Throttled, "{code}");
        }
        assert_eq!(classify_http_status(408), ErrorKind::Timeout);
        assert_eq!(classify(&FetchError::Http(502)), ErrorKind::Http5xx(502));
    }

    #[test]
    fn missing_tiles_are_permanent() {
        for code in [400, 403, 404, 410] {
            assert!(!classify_http_status(code).is_transient(), "{code}");
        }
        assert!(!classify(&FetchError::EmptyBody).is_transient());
        assert!(!classify(&FetchError::Malformed("<html>".into())).is_transient());
    }

    #[test]
    fn curl_network_errors_are_transient() {
        // 28 = operation timed out, 7 = couldn't connect, 6 = couldn't resolve host
        assert_eq!(classify(&FetchError::Curl(curl::Error::new(28))), ErrorKind::Timeout);
        assert_eq!(classify(&FetchError::Curl(curl::Error::new(7))), ErrorKind::Connection);
        assert_eq!(classify(&FetchError::Curl(curl::Error::new(6))), ErrorKind::Connection);
        // 3 = malformed URL
        assert_eq!(classify(&FetchError::Curl(curl::Error::new(3))), ErrorKind::Other);
    }
}
