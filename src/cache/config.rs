//! Cache configuration.
//!
//! Controls entry lifetimes, alias length and snapshot location via `daoctl.toml`.

use std::path::PathBuf;
use std::time::Duration;

use time::OffsetDateTime;

// Default values for cache configuration
const DEFAULT_DOCUMENT_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_PAGE_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_SHORT_HASH_LEN: usize = 5;
const DEFAULT_SNAPSHOT_PATH: &str = ".graph.cache";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of documents, aliases, edges and the type index.
    pub document_ttl: Duration,
    /// Lifetime of assembled navigation pages.
    pub page_ttl: Duration,
    /// Number of leading hash characters used as an alias.
    pub short_hash_len: usize,
    /// Write documents fetched on a cache miss back into the cache.
    pub backfill_on_miss: bool,
    /// Location of the on-disk snapshot.
    pub snapshot_path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            document_ttl: DEFAULT_DOCUMENT_TTL,
            page_ttl: DEFAULT_PAGE_TTL,
            short_hash_len: DEFAULT_SHORT_HASH_LEN,
            backfill_on_miss: false,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            document_ttl: settings.document_ttl,
            page_ttl: settings.page_ttl,
            short_hash_len: settings.short_hash_len,
            backfill_on_miss: settings.backfill_on_miss,
            snapshot_path: settings.snapshot_path.clone(),
        }
    }
}

impl CacheConfig {
    /// Expiry instant of a document-class entry written at `now`.
    pub fn document_expiry(&self, now: OffsetDateTime) -> OffsetDateTime {
        expiry_after(now, self.document_ttl)
    }

    /// Returns the alias length, clamping to 1 if zero.
    pub fn short_hash_len_non_zero(&self) -> usize {
        self.short_hash_len.max(1)
    }
}

/// `now + ttl`, saturating at the largest representable instant.
pub(crate) fn expiry_after(now: OffsetDateTime, ttl: Duration) -> OffsetDateTime {
    time::Duration::try_from(ttl)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .unwrap_or_else(|| time::PrimitiveDateTime::MAX.assume_utc())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.document_ttl, Duration::from_secs(3600));
        assert_eq!(config.page_ttl, Duration::from_secs(300));
        assert_eq!(config.short_hash_len, 5);
        assert!(!config.backfill_on_miss);
        assert_eq!(config.snapshot_path, PathBuf::from(".graph.cache"));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            short_hash_len: 0,
            ..Default::default()
        };
        assert_eq!(config.short_hash_len_non_zero(), 1);
    }

    #[test]
    fn expiry_adds_ttl() {
        let config = CacheConfig::default();
        assert_eq!(
            config.document_expiry(datetime!(2021-01-01 00:00 UTC)),
            datetime!(2021-01-01 01:00 UTC)
        );
    }

    #[test]
    fn expiry_saturates() {
        let far = expiry_after(datetime!(2021-01-01 00:00 UTC), Duration::MAX);
        assert!(far > datetime!(9000-01-01 00:00 UTC));
    }
}
