//! HTTP range source implementation using reqwest.

use std::io::{self, Read};
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT_RANGES, AUTHORIZATION, CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::config::ChunkReaderConfig;
use super::error::StreamingError;
use super::reader::ParallelChunkReader;
use super::source::{RandomAccessSource, StreamingResult};

/// Configuration for HTTP range requests.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
    /// Maximum number of retry attempts for transient failures (default: 3).
    pub max_retries: u32,
    /// Authentication configuration.
    pub auth: Option<HttpAuthConfig>,
    /// Custom User-Agent header.
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            auth: None,
            user_agent: None,
        }
    }
}

/// Authentication configuration for HTTP requests.
#[derive(Debug, Clone)]
pub enum HttpAuthConfig {
    /// Bearer token authentication (e.g., for API tokens).
    Bearer(String),
    /// Custom header-based authentication.
    CustomHeader {
        /// Header name (e.g., "X-API-Key")
        name: String,
        /// Header value
        value: String,
    },
}

/// HTTP source that fetches data using range requests.
///
/// Credentials are supplied up front through [`HttpConfig::auth`] (or baked into a
/// presigned URL); the source never resolves them itself.
pub struct HttpRangeSource {
    url: String,
    client: Client,
    config: HttpConfig,
    content_length: OnceLock<u64>,
}

impl HttpRangeSource {
    /// Creates a new HTTP range source from a URL with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not support range requests or is unreachable.
    pub fn from_url(url: impl Into<String>) -> StreamingResult<Self> {
        Self::with_config(url, HttpConfig::default())
    }

    /// Creates a new HTTP range source with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not support range requests or is unreachable.
    pub fn with_config(url: impl Into<String>, config: HttpConfig) -> StreamingResult<Self> {
        let url = url.into();

        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref ua) = config.user_agent {
            client_builder = client_builder.user_agent(ua.clone());
        } else {
            client_builder =
                client_builder.user_agent(concat!("blobstream/", env!("CARGO_PKG_VERSION")));
        }

        let client = client_builder.build()?;

        let source = Self {
            url,
            client,
            config,
            content_length: OnceLock::new(),
        };

        // Validate that the server supports range requests by doing a HEAD request
        source.validate_range_support()?;

        Ok(source)
    }

    /// Returns the configuration this source was built with.
    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Validates that the server supports range requests.
    fn validate_range_support(&self) -> StreamingResult<()> {
        let response = self
            .apply_auth(self.client.head(&self.url))
            .send()
            .map_err(|e| self.map_transport(e))?;
        self.check_status(&response)?;

        if let Some(accept_ranges) = response.headers().get(ACCEPT_RANGES) {
            if accept_ranges.to_str().map_or(true, |v| v == "none") {
                return Err(StreamingError::RangeNotSupported);
            }
        }

        if let Some(len) = content_length(&response) {
            let _ = self.content_length.set(len);
        }

        debug!(url = %self.url, content_length = ?self.content_length.get(), "range source ready");
        Ok(())
    }

    /// Applies authentication headers to a request.
    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            Some(HttpAuthConfig::Bearer(token)) => {
                request.header(AUTHORIZATION, format!("Bearer {token}"))
            }
            Some(HttpAuthConfig::CustomHeader { name, value }) => request.header(name, value),
            None => request,
        }
    }

    fn check_status(&self, response: &Response) -> StreamingResult<()> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(StreamingError::NotFound {
                url: self.url.clone(),
            });
        }

        if !status.is_success() {
            return Err(StreamingError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown error").into(),
            });
        }

        Ok(())
    }

    fn map_transport(&self, err: reqwest::Error) -> StreamingError {
        if err.is_timeout() {
            StreamingError::Timeout {
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            err.into()
        }
    }

    /// Executes a range request with retry logic.
    fn fetch_range_with_retry(&self, buf: &mut [u8], offset: u64) -> StreamingResult<usize> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                // Exponential backoff: 100ms, 200ms, 400ms, ...
                let delay_ms = 100 * (1u64 << (attempt - 1).min(16));
                std::thread::sleep(Duration::from_millis(delay_ms));
            }

            match self.fetch_range_once(buf, offset) {
                Ok(n) => return Ok(n),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    warn!(url = %self.url, offset, attempt, error = %e, "retrying range request");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Executes a single range request, streaming the body straight into `buf`.
    fn fetch_range_once(&self, buf: &mut [u8], offset: u64) -> StreamingResult<usize> {
        let end = offset.saturating_add(buf.len() as u64).saturating_sub(1);
        let range_value = format!("bytes={offset}-{end}");

        let mut response = self
            .apply_auth(self.client.get(&self.url).header(RANGE, range_value))
            .send()
            .map_err(|e| self.map_transport(e))?;
        self.check_status(&response)?;

        // A plain 200 means the server ignored the range and sent the whole object.
        if response.status() != StatusCode::PARTIAL_CONTENT && offset > 0 {
            let skipped = io::copy(&mut (&mut response).take(offset), &mut io::sink())?;
            if skipped < offset {
                return Err(StreamingError::UnexpectedEndOfData {
                    expected: offset,
                    actual: skipped,
                });
            }
        }

        let mut filled = 0;
        while filled < buf.len() {
            match response.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    return Err(StreamingError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(filled)
    }
}

impl RandomAccessSource for HttpRangeSource {
    fn total_size(&self) -> StreamingResult<u64> {
        if let Some(&size) = self.content_length.get() {
            return Ok(size);
        }

        // Fetch via HEAD request
        let response = self
            .apply_auth(self.client.head(&self.url))
            .send()
            .map_err(|e| self.map_transport(e))?;
        self.check_status(&response)?;

        let size = content_length(&response).ok_or_else(|| StreamingError::Http {
            status: 0,
            message: "Missing Content-Length header".into(),
        })?;

        let _ = self.content_length.set(size);
        Ok(size)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> StreamingResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let size = self.total_size()?;
        if offset >= size {
            return Ok(0);
        }
        let available = usize::try_from(size - offset).unwrap_or(usize::MAX);
        let len = buf.len().min(available);

        self.fetch_range_with_retry(&mut buf[..len], offset)
    }

    fn source_id(&self) -> &str {
        &self.url
    }
}

fn content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Opens `url` as a sequential stream fetched in parallel range chunks.
///
/// The object length comes from the `Content-Length` of a HEAD request.
///
/// # Errors
///
/// Returns an error if the server is unreachable, does not support range
/// requests, does not report a length, or reports a length of zero.
pub fn open_url(
    url: impl Into<String>,
    http: HttpConfig,
    config: ChunkReaderConfig,
) -> StreamingResult<ParallelChunkReader> {
    let source = HttpRangeSource::with_config(url, http)?;
    ParallelChunkReader::from_source(source, config)
}
