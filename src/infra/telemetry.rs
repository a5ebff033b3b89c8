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

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "yatube_index_cache_hit_total",
            Unit::Count,
            "Index page requests served from the feed cache."
        );
        describe_counter!(
            "yatube_index_cache_miss_total",
            Unit::Count,
            "Index page requests that found no fresh cached render."
        );
        describe_counter!(
            "yatube_index_cache_store_total",
            Unit::Count,
            "Index page renders written to the feed cache."
        );
        describe_counter!(
            "yatube_index_cache_clear_total",
            Unit::Count,
            "Explicit feed cache clears."
        );
        describe_counter!(
            "yatube_posts_created_total",
            Unit::Count,
            "Posts published through the create form."
        );
        describe_counter!(
            "yatube_comments_created_total",
            Unit::Count,
            "Comments accepted on post detail pages."
        );
        describe_counter!(
            "yatube_logins_total",
            Unit::Count,
            "Successful logins and signups that issued a session."
        );
        describe_histogram!(
            "yatube_http_request_ms",
            Unit::Milliseconds,
            "Request handling latency in milliseconds."
        );
    });
}
