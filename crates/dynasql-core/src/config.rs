//! Execution configuration.

use std::env;

use crate::batch::MAX_BATCH_WRITE;

/// Tunables for the executor and batch writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynaSqlConfig {
    /// Items per `BatchWriteItem` call, 1..=25.
    pub batch_write_size: usize,
    /// `BatchWriteItem` calls in flight at once.
    pub batch_concurrency: usize,
    /// Page size for statements without `PageSize(n)`.
    pub default_page_size: Option<u32>,
    /// Log every prepared statement at `info`.
    pub log_statements: bool,
}

impl DynaSqlConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_write_size: env_parse("DYNASQL_BATCH_WRITE_SIZE")
                .unwrap_or(defaults.batch_write_size)
                .clamp(1, MAX_BATCH_WRITE),
            batch_concurrency: env_parse("DYNASQL_BATCH_CONCURRENCY")
                .unwrap_or(defaults.batch_concurrency)
                .max(1),
            default_page_size: env_parse("DYNASQL_DEFAULT_PAGE_SIZE").filter(|n| *n > 0),
            log_statements: env_bool("DYNASQL_LOG_STATEMENTS", defaults.log_statements),
        }
    }

    #[must_use]
    pub fn with_batch_write_size(mut self, size: usize) -> Self {
        self.batch_write_size = size.clamp(1, MAX_BATCH_WRITE);
        self
    }

    #[must_use]
    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_default_page_size(mut self, page_size: Option<u32>) -> Self {
        self.default_page_size = page_size.filter(|n| *n > 0);
        self
    }
}

impl Default for DynaSqlConfig {
    fn default() -> Self {
        Self {
            batch_write_size: MAX_BATCH_WRITE,
            batch_concurrency: 4,
            default_page_size: None,
            log_statements: false,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_to_full_batches() {
        let config = DynaSqlConfig::default();
        assert_eq!(config.batch_write_size, 25);
        assert_eq!(config.batch_concurrency, 4);
        assert_eq!(config.default_page_size, None);
        assert!(!config.log_statements);
    }

    #[test]
    fn test_should_clamp_builder_values() {
        let config = DynaSqlConfig::default()
            .with_batch_write_size(100)
            .with_batch_concurrency(0)
            .with_default_page_size(Some(0));
        assert_eq!(config.batch_write_size, 25);
        assert_eq!(config.batch_concurrency, 1);
        assert_eq!(config.default_page_size, None);
        assert_eq!(DynaSqlConfig::default().with_batch_write_size(0).batch_write_size, 1);
    }
}
