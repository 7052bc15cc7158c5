//! Environment variable parsing for policy overrides.

use crate::policy::model::{apply_policy_update, MissingPathPolicy, PolicyPath, PolicyUpdate};
use filter_errors::{usage, ErrorCode, FilterResult};
use std::env;
use std::str::FromStr;

/// What to do with candidates that cannot report a path (`keep` or `fail`).
pub const ENV_ON_MISSING_PATH: &str = "SOURCE_FILTER_ON_MISSING_PATH";
/// Log level filter for the filter crate (`RUST_LOG` syntax).
pub const ENV_LOG_LEVEL: &str = "SOURCE_FILTER_LOG_LEVEL";
/// Log destination file; empty restores stderr.
pub const ENV_LOG_FILE: &str = "SOURCE_FILTER_LOG_FILE";
/// Emit JSON error trailers on stderr.
pub const ENV_JSON_ERRORS: &str = "SOURCE_FILTER_JSON_ERRORS";
/// Print `cargo:rerun-if-changed` lines for kept sources.
pub const ENV_CARGO_DIRECTIVES: &str = "SOURCE_FILTER_CARGO_DIRECTIVES";

/// Load policy overrides from environment variables.
pub fn configure_policy_from_env() -> FilterResult<()> {
    let mut update = PolicyUpdate::default();

    if let Ok(value) = env::var(ENV_ON_MISSING_PATH) {
        let policy = MissingPathPolicy::from_str(&value).map_err(|err| err.0)?;
        update.on_missing_path = Some(policy);
    }

    if let Ok(value) = env::var(ENV_LOG_LEVEL) {
        update.log_level = Some(value);
    }

    if let Ok(value) = env::var(ENV_LOG_FILE) {
        let path = if value.trim().is_empty() {
            PolicyPath::Clear
        } else {
            PolicyPath::Value(value.into())
        };
        update.log_file = Some(path);
    }

    if let Ok(value) = env::var(ENV_JSON_ERRORS) {
        update.json_errors = Some(parse_bool(&value)?);
    }

    if let Ok(value) = env::var(ENV_CARGO_DIRECTIVES) {
        update.emit_cargo_directives = Some(parse_bool(&value)?);
    }

    apply_policy_update(update);
    Ok(())
}

fn parse_bool(value: &str) -> FilterResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(usage!(
            ErrorCode::InvalidPolicyValue,
            "invalid boolean value '{}' (expected true/false)",
            other
        )),
    }
}
