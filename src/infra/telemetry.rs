use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::render::METRIC_RENDER_MS;
use crate::cache::{
    METRIC_CLEARED_TOTAL, METRIC_CORRUPT_TOTAL, METRIC_EXPIRED_TOTAL, METRIC_HIT_TOTAL,
    METRIC_MISS_TOTAL, METRIC_PURGED_TOTAL, METRIC_WRITE_FAILED_TOTAL, METRIC_WRITE_TOTAL,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so rendered SVG on stdout stays clean.
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

/// Register descriptions for every metric the crate emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_HIT_TOTAL,
            Unit::Count,
            "Total number of diagram cache hits."
        );
        describe_counter!(
            METRIC_MISS_TOTAL,
            Unit::Count,
            "Total number of diagram cache misses, including expired and corrupt entries."
        );
        describe_counter!(
            METRIC_EXPIRED_TOTAL,
            Unit::Count,
            "Total number of entries dropped on read because they outlived the TTL."
        );
        describe_counter!(
            METRIC_CORRUPT_TOTAL,
            Unit::Count,
            "Total number of reads that found an undecodable entry."
        );
        describe_counter!(
            METRIC_WRITE_TOTAL,
            Unit::Count,
            "Total number of rendered diagrams written to the cache."
        );
        describe_counter!(
            METRIC_WRITE_FAILED_TOTAL,
            Unit::Count,
            "Total number of cache writes refused by session storage."
        );
        describe_counter!(
            METRIC_PURGED_TOTAL,
            Unit::Count,
            "Total number of stale entries removed by purges."
        );
        describe_counter!(
            METRIC_CLEARED_TOTAL,
            Unit::Count,
            "Total number of entries removed by clear-all."
        );
        describe_histogram!(
            METRIC_RENDER_MS,
            Unit::Milliseconds,
            "Diagram renderer latency in milliseconds on cache misses."
        );
    });
}
