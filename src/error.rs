/// Boxed error type produced by user-supplied fetchers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The fetcher for a key failed.
    #[error("fetch failed for key '{key}': {message}")]
    Fetch { key: String, message: String },
}

impl CacheError {
    /// Create a new fetch error from a fetcher failure.
    pub fn fetch(key: impl Into<String>, source: &BoxError) -> Self {
        CacheError::Fetch {
            key: key.into(),
            message: source.to_string(),
        }
    }
}
