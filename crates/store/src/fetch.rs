//! Remote source fetcher.
//!
//! Streams the dataset blob over a plain HTTP GET with a connect timeout
//! and an overall wall-clock deadline, accumulating fixed-size chunks and
//! parsing the whole body as JSON on completion. No partial result is
//! ever accepted: every failure path returns an error and the caller
//! falls back to the local cache or an empty dataset.

use paddock_core::{Dataset, Error, Result};
use std::io::Read;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Bytes per read chunk (1 MiB, matching the upstream transfer unit).
const CHUNK_SIZE: usize = 1024 * 1024;

/// Log download progress every this many chunks.
const PROGRESS_EVERY: u64 = 10;

/// Streaming downloader for the remote dataset blob.
#[derive(Debug, Clone)]
pub struct Fetcher {
    url: String,
    connect_timeout: Duration,
    download_timeout: Duration,
}

impl Fetcher {
    /// Create a fetcher for `url` with the given timeouts.
    pub fn new(url: impl Into<String>, connect_timeout: Duration, download_timeout: Duration) -> Self {
        Fetcher {
            url: url.into(),
            connect_timeout,
            download_timeout,
        }
    }

    /// The configured source URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download and parse the full dataset.
    ///
    /// Fails with [`Error::Timeout`] when either timeout fires,
    /// [`Error::Transfer`] for connection errors and non-2xx statuses,
    /// and [`Error::Parse`] when the accumulated body is not dataset
    /// JSON.
    pub fn fetch(&self) -> Result<Dataset> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.download_timeout)
            .build()
            .map_err(|e| Error::Transfer(e.to_string()))?;

        info!(url = %self.url, "downloading knowledge dataset");
        let start = Instant::now();
        let deadline = start + self.download_timeout;

        let response = client.get(&self.url).send().map_err(classify)?;
        if !response.status().is_success() {
            return Err(Error::Transfer(format!("HTTP {}", response.status())));
        }

        let content_length = response.content_length();
        if let Some(len) = content_length {
            info!(bytes = len, "dataset size {:.1} MiB", len as f64 / 1024.0 / 1024.0);
        }

        // The length header is advisory and unvalidated; trust it for
        // preallocation only up to a bound, and let the buffer grow past
        // that as real bytes arrive.
        let prealloc = content_length
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0)
            .min(64 * CHUNK_SIZE);
        let mut body: Vec<u8> = Vec::with_capacity(prealloc);
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut chunks_read: u64 = 0;
        let mut reader = response;

        loop {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "streaming download exceeded {}s",
                    self.download_timeout.as_secs()
                )));
            }
            let n = reader.read(&mut chunk).map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    Error::Timeout(e.to_string())
                } else {
                    Error::Transfer(e.to_string())
                }
            })?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
            chunks_read += 1;
            if chunks_read % PROGRESS_EVERY == 0 {
                if let Some(len) = content_length.filter(|&len| len > 0) {
                    debug!(
                        "download progress {:.1}%",
                        body.len() as f64 / len as f64 * 100.0
                    );
                }
            }
        }

        debug!(bytes = body.len(), "parsing dataset JSON");
        let dataset: Dataset =
            serde_json::from_slice(&body).map_err(|e| Error::Parse(e.to_string()))?;
        info!(
            horses = dataset.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dataset download complete"
        );
        Ok(dataset)
    }
}

fn classify(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Transfer(e.to_string())
    }
}
