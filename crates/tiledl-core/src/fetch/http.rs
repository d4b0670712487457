//! libcurl-backed fetcher.

use std::sync::atomic::{AtomicBool, Ordering};

use super::{FetchError, FetchOptions, TileFetcher};

/// Upper bound on a single tile body; anything larger is not a map tile.
const MAX_TILE_BYTES: usize = 16 * 1024 * 1024;

/// Fetches tiles with a fresh curl easy handle per attempt.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    opts: FetchOptions,
}

impl CurlFetcher {
    pub fn new(opts: FetchOptions) -> Self {
        Self { opts }
    }

    fn setup(&self, easy: &mut curl::easy::Easy, url: &str) -> Result<(), curl::Error> {
        easy.url(url)?;
        easy.get(true)?;
        easy.follow_location(true)?;
        easy.max_redirections(5)?;
        easy.useragent(&self.opts.user_agent)?;
        easy.connect_timeout(self.opts.connect_timeout)?;
        easy.timeout(self.opts.request_timeout)?;
        easy.progress(true)?;
        Ok(())
    }
}

impl TileFetcher for CurlFetcher {
    fn fetch(&self, url: &str, cancel: &AtomicBool) -> Result<Vec<u8>, FetchError> {
        let mut easy = curl::easy::Easy::new();
        self.setup(&mut easy, url).map_err(FetchError::Curl)?;

        let mut body = Vec::new();
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    if body.len() + data.len() > MAX_TILE_BYTES {
                        return Ok(0); // abort transfer
                    }
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(FetchError::Curl)?;
            transfer
                .progress_function(|_, _, _, _| !cancel.load(Ordering::Relaxed))
                .map_err(FetchError::Curl)?;
            transfer.perform()
        };
        if let Err(e) = performed {
            if e.is_aborted_by_callback() || cancel.load(Ordering::Relaxed) {
                return Err(FetchError::Aborted);
            }
            return Err(FetchError::Curl(e));
        }

        let code = easy.response_code().map_err(FetchError::Curl)?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        super::check_tile_body(&body)?;
        tracing::trace!(url, bytes = body.len(), "fetched tile");
        Ok(body)
    }
}
