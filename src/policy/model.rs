//! Policy data structures and in-memory management.

use filter_errors::{usage, ErrorCode, FilterError};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::RwLock;

static POLICY: OnceCell<RwLock<FilterPolicy>> = OnceCell::new();

fn policy_cell() -> &'static RwLock<FilterPolicy> {
    POLICY.get_or_init(|| RwLock::new(FilterPolicy::default()))
}

/// What the pipeline does with a candidate that cannot report its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPathPolicy {
    /// Pass the candidate through; unrelated files are never dropped silently.
    #[default]
    Keep,
    /// Abort the enumeration pass with `ERR_MISSING_SOURCE_PATH`.
    Fail,
}

impl MissingPathPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MissingPathPolicy::Keep => "keep",
            MissingPathPolicy::Fail => "fail",
        }
    }
}

#[derive(Debug)]
pub struct PolicyParseError(pub FilterError);

impl FromStr for MissingPathPolicy {
    type Err = PolicyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(MissingPathPolicy::Keep),
            "fail" | "error" => Ok(MissingPathPolicy::Fail),
            other => Err(PolicyParseError(usage!(
                ErrorCode::InvalidPolicyValue,
                "invalid on_missing_path value '{}' (expected 'keep' or 'fail')",
                other
            ))),
        }
    }
}

/// Process-wide configuration for build scripts using the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    pub on_missing_path: MissingPathPolicy,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub json_errors: bool,
    pub emit_cargo_directives: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            on_missing_path: MissingPathPolicy::Keep,
            log_level: None,
            log_file: None,
            json_errors: false,
            emit_cargo_directives: true,
        }
    }
}

impl FilterPolicy {
    pub(crate) fn apply_update(&mut self, update: PolicyUpdate) {
        if let Some(on_missing_path) = update.on_missing_path {
            self.on_missing_path = on_missing_path;
        }
        if let Some(level) = update.log_level {
            self.log_level = match level.trim() {
                "" => None,
                other => Some(other.to_string()),
            };
        }
        if let Some(path) = update.log_file {
            self.log_file = match path {
                PolicyPath::Clear => None,
                PolicyPath::Value(pb) => Some(pb),
            };
        }
        if let Some(json_errors) = update.json_errors {
            self.json_errors = json_errors;
        }
        if let Some(emit) = update.emit_cargo_directives {
            self.emit_cargo_directives = emit;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum PolicyPath {
    Clear,
    Value(PathBuf),
}

/// Mutation record for the policy.
#[derive(Debug, Default, Clone)]
pub(crate) struct PolicyUpdate {
    pub(crate) on_missing_path: Option<MissingPathPolicy>,
    pub(crate) log_level: Option<String>,
    pub(crate) log_file: Option<PolicyPath>,
    pub(crate) json_errors: Option<bool>,
    pub(crate) emit_cargo_directives: Option<bool>,
}

/// Snapshot the current policy.
pub fn policy_snapshot() -> FilterPolicy {
    match policy_cell().read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Apply the provided update to the global policy and propagate logging changes.
pub(crate) fn apply_policy_update(update: PolicyUpdate) {
    let mut guard = match policy_cell().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.apply_update(update);
    crate::logging::apply_policy(&guard);
}

#[cfg(test)]
pub(crate) fn reset_policy_for_tests() {
    let mut guard = policy_cell().write().expect("policy lock poisoned");
    *guard = FilterPolicy::default();
    crate::logging::apply_policy(&guard);
}

/// Serialises tests that touch the global policy or environment variables.
#[cfg(test)]
pub(crate) fn policy_test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
