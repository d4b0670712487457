//! Tile fetching: one HTTP GET per attempt.
//!
//! `TileFetcher` is the seam between the scheduler and the network so pools
//! can be driven by an in-memory fetcher in tests. `CurlFetcher` is the
//! production implementation on libcurl.

mod http;

pub use http::CurlFetcher;

use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Failure of a single fetch attempt.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[source] curl::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// 2xx with no body; treated as malformed.
    #[error("empty response body")]
    EmptyBody,
    /// 2xx whose body is not a recognisable image (quota or error pages).
    #[error("response is not a tile image: {0}")]
    Malformed(String),
    /// Transfer stopped because the run was cancelled.
    #[error("transfer aborted")]
    Aborted,
}

/// Reject bodies that no image decoder would recognise.
pub fn check_tile_body(body: &[u8]) -> Result<(), FetchError> {
    if body.is_empty() {
        return Err(FetchError::EmptyBody);
    }
    image::guess_format(body).map(|_| ()).map_err(|_| {
        let head = String::from_utf8_lossy(&body[..body.len().min(32)]).into_owned();
        FetchError::Malformed(format!("{} bytes starting {:?}", body.len(), head))
    })
}

/// Fetches the raw bytes behind one tile URL.
pub trait TileFetcher: Send + Sync {
    /// Perform one attempt. Implementations should return promptly with
    /// `FetchError::Aborted` once `cancel` is set.
    fn fetch(&self, url: &str, cancel: &AtomicBool) -> Result<Vec<u8>, FetchError>;
}

/// Per-request transport settings.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            user_agent: format!("TileDL/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchOptions {
    pub fn from_config(cfg: &crate::config::TileDlConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            user_agent: cfg.user_agent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_body_check() {
        assert!(check_tile_body(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").is_ok());
        assert!(check_tile_body(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]).is_ok());
        assert!(matches!(check_tile_body(b""), Err(FetchError::EmptyBody)));
        assert!(matches!(
            check_tile_body(b"<html>quota exceeded</html>"),
            Err(FetchError::Malformed(_))
        ));
    }
}
