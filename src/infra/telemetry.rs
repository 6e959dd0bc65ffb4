use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

pub const DOCUMENT_HIT_TOTAL: &str = "daoctl_cache_document_hit_total";
pub const DOCUMENT_MISS_TOTAL: &str = "daoctl_cache_document_miss_total";
pub const PAGE_HIT_TOTAL: &str = "daoctl_cache_page_hit_total";
pub const PAGE_MISS_TOTAL: &str = "daoctl_cache_page_miss_total";
pub const REBUILD_TOTAL: &str = "daoctl_cache_rebuild_total";
pub const REBUILD_MS: &str = "daoctl_cache_rebuild_ms";
pub const PREFETCH_FAILED_TOTAL: &str = "daoctl_prefetch_failed_total";

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            DOCUMENT_HIT_TOTAL,
            Unit::Count,
            "Total number of document cache hits, including alias hits."
        );
        describe_counter!(
            DOCUMENT_MISS_TOTAL,
            Unit::Count,
            "Total number of document lookups served by the remote source."
        );
        describe_counter!(
            PAGE_HIT_TOTAL,
            Unit::Count,
            "Total number of page cache hits."
        );
        describe_counter!(
            PAGE_MISS_TOTAL,
            Unit::Count,
            "Total number of pages built from scratch."
        );
        describe_counter!(
            REBUILD_TOTAL,
            Unit::Count,
            "Total number of full cache rebuilds from the remote source."
        );
        describe_histogram!(
            REBUILD_MS,
            Unit::Milliseconds,
            "Full cache rebuild latency in milliseconds."
        );
        describe_counter!(
            PREFETCH_FAILED_TOTAL,
            Unit::Count,
            "Total number of neighbor prefetches that failed."
        );
    });
}
