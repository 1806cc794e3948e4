//! Acquiring the raw bytes of a font face.
//!
//! Local and inline sources are read directly. Remote sources go through
//! a [`FontFetcher`], the seam that keeps network I/O out of tests: the
//! production [`HttpFetcher`] uses `ureq`, tests substitute a recording
//! mock.

use crate::data_url;
use crate::dsl::FaceSource;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid inline font data: {0}")]
    Inline(#[from] data_url::DataUrlError),
}

/// Fetches remote font bytes.
///
/// Implementations must be usable from rayon workers, hence `Send + Sync`.
pub trait FontFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

/// Largest response body [`HttpFetcher`] accepts unless told otherwise.
///
/// CJK faces routinely exceed ureq's 10 MiB default.
pub const DEFAULT_MAX_FONT_BYTES: u64 = 64 * 1024 * 1024;

/// HTTP(S) fetcher with a global per-request timeout and a body size cap.
pub struct HttpFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
            max_bytes: DEFAULT_MAX_FONT_BYTES,
        }
    }

    /// Reject response bodies longer than `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl FontFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let fetch_error = |message: String| SourceError::Fetch {
            url: url.to_string(),
            message,
        };
        // Non-2xx statuses surface as `ureq::Error::StatusCode`.
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| fetch_error(e.to_string()))?;
        response
            .body_mut()
            .with_config()
            .limit(self.max_bytes)
            .read_to_vec()
            .map_err(|e| fetch_error(e.to_string()))
    }
}

/// Read a face's bytes from wherever its source points.
pub fn acquire(source: &FaceSource, fetcher: &dyn FontFetcher) -> Result<Vec<u8>, SourceError> {
    match source {
        FaceSource::Remote(url) => fetcher.fetch(url),
        FaceSource::Local(path) => std::fs::read(path).map_err(|source| SourceError::Read {
            path: path.clone(),
            source,
        }),
        FaceSource::Inline(url) => Ok(data_url::decode(url)?.bytes),
    }
}
