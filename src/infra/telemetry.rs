//! Process-wide tracing subscriber and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const USER_CACHE_HIT: &str = "realworld_user_cache_hit_total";
pub const USER_CACHE_MISS: &str = "realworld_user_cache_miss_total";
pub const USER_CACHE_SET_ERROR: &str = "realworld_user_cache_set_error_total";
pub const HTTP_PANICS: &str = "realworld_http_panics_total";
pub const HTTP_DEADLINE_EXCEEDED: &str = "realworld_http_deadline_exceeded_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` directives win over the configured level.
///
/// JSON output carries the enclosing request span, so every line logged while a
/// request is served includes its `request_id`.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let output = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(output)
        .try_init()?;
    Ok(())
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(USER_CACHE_HIT, Unit::Count, "User lookups served from the cache.");
        describe_counter!(
            USER_CACHE_MISS,
            Unit::Count,
            "User lookups that fell through to the users store."
        );
        describe_counter!(
            USER_CACHE_SET_ERROR,
            Unit::Count,
            "User cache writes that failed and were dropped."
        );
        describe_counter!(HTTP_PANICS, Unit::Count, "Handlers that panicked.");
        describe_counter!(
            HTTP_DEADLINE_EXCEEDED,
            Unit::Count,
            "Requests cut off by the per-request deadline."
        );
    });
}
