//! Runtime configuration policy for the filter pipeline.

mod env;
mod model;

pub use env::{
    configure_policy_from_env, ENV_CARGO_DIRECTIVES, ENV_JSON_ERRORS, ENV_LOG_FILE,
    ENV_LOG_LEVEL, ENV_ON_MISSING_PATH,
};
pub use model::{policy_snapshot, FilterPolicy, MissingPathPolicy, PolicyParseError};

pub(crate) use model::{apply_policy_update, PolicyUpdate};

#[cfg(test)]
pub(crate) use model::{policy_test_lock, reset_policy_for_tests};
