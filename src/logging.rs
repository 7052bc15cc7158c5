//! Diagnostics utilities: structured logging, metrics sinks, and error trailers.

mod logger;
mod metrics;
mod trailer;

pub use logger::{
    init_logging_with_default, log_filter_error, set_active_target, with_error_code,
};
pub use metrics::{
    install_metrics, record_dropped, record_kept, record_missing_path, FilterMetrics,
};
pub use trailer::emit_error_trailer;

#[cfg(test)]
pub use metrics::test_support;
#[cfg(test)]
pub use trailer::set_error_trailer_writer_for_tests;

use crate::policy::FilterPolicy;

/// Default filter used when neither `RUST_LOG` nor the policy sets one.
pub const DEFAULT_LOG_FILTER: &str = "warn,build_source_filter=info";

pub fn apply_policy(policy: &FilterPolicy) {
    logger::apply_logger_policy(policy);
    trailer::set_json_errors_enabled(policy.json_errors);
}
