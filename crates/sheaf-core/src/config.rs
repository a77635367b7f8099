//! Tuning knobs for the extraction pass.

use std::time::Duration;

/// HTTP client configuration for catalog service calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-call deadline. A call past this is classified as a transport error.
    pub timeout: Duration,
    /// How many times a transport failure is retried before the query gives up.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff.
    pub retry_base_delay: Duration,
    /// Minimum spacing between successive page fetches within one query.
    pub page_spacing: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            page_spacing: Duration::from_millis(200),
        }
    }
}

/// Extraction scheduling configuration.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Maximum number of partitions extracted in parallel.
    pub concurrency: usize,
    /// Minimum spacing between consecutive calls against one partition,
    /// retries included.
    pub call_spacing: Duration,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_spacing: Duration::from_millis(200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_defaults() {
        let http = HttpConfig::default();
        assert_eq!(http.timeout, Duration::from_secs(30));
        assert_eq!(http.max_retries, 3);
        assert_eq!(http.retry_base_delay, Duration::from_millis(500));
        assert_eq!(http.page_spacing, Duration::from_millis(200));
    }

    #[test]
    fn test_extract_defaults() {
        let extract = ExtractConfig::default();
        assert!(extract.concurrency > 0, "concurrency should be positive");
        assert_eq!(extract.call_spacing, Duration::from_millis(200));
    }
}
