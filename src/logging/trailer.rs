//! One-line JSON descriptions of filter errors for tooling that scrapes
//! build-script output.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use filter_errors::{ErrorKind, FilterError};
use once_cell::sync::OnceCell;
use serde::Serialize;

use super::logger;

/// Context keys promoted to top-level trailer fields.
const LIFTED_KEYS: [&str; 3] = ["middleware", "path", "manifest"];

static JSON_ERRORS_ENABLED: AtomicBool = AtomicBool::new(false);
static ERROR_TRAILER_WRITER: OnceCell<Mutex<Box<dyn Write + Send>>> = OnceCell::new();

pub(crate) fn set_json_errors_enabled(enabled: bool) {
    JSON_ERRORS_ENABLED.store(enabled, Ordering::SeqCst);
}

#[derive(Serialize)]
struct ErrorTrailer<'a> {
    error_code: &'static str,
    error_kind: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    middleware: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<&'a str>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    context: serde_json::Map<String, serde_json::Value>,
    run_id: Option<String>,
    build_target: Option<String>,
}

impl<'a> ErrorTrailer<'a> {
    fn from_error(err: &'a FilterError) -> Self {
        let lifted = |wanted: &str| {
            err.context
                .iter()
                .find(|(key, _)| *key == wanted)
                .map(|(_, value)| value.as_str())
        };
        let context = err
            .context
            .iter()
            .filter(|(key, _)| !LIFTED_KEYS.contains(key))
            .map(|(key, value)| ((*key).to_string(), serde_json::Value::String(value.clone())))
            .collect();
        let (run_id, build_target) = match logger::snapshot_run_and_target() {
            Some((run_id, target)) => (Some(run_id), target),
            None => (None, None),
        };
        ErrorTrailer {
            error_code: err.code.as_str(),
            error_kind: kind_label(err.kind),
            message: err.message(),
            middleware: lifted("middleware"),
            path: lifted("path"),
            manifest: lifted("manifest"),
            context,
            run_id,
            build_target,
        }
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Usage => "usage",
        ErrorKind::Environment => "environment",
        ErrorKind::Target => "target",
    }
}

/// Write a single-line JSON description of `err` when JSON errors are on.
pub fn emit_error_trailer(err: &FilterError) {
    if !JSON_ERRORS_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    let Ok(mut bytes) = serde_json::to_vec(&ErrorTrailer::from_error(err)) else {
        return;
    };
    bytes.push(b'\n');
    match ERROR_TRAILER_WRITER.get() {
        Some(writer) => {
            let mut guard = writer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let _ = guard.write_all(&bytes).and_then(|()| guard.flush());
        }
        None => {
            let mut stderr = io::stderr().lock();
            let _ = stderr.write_all(&bytes).and_then(|()| stderr.flush());
        }
    }
}

#[cfg(test)]
pub fn set_error_trailer_writer_for_tests(writer: Box<dyn Write + Send>) {
    let _ = ERROR_TRAILER_WRITER.set(Mutex::new(writer));
}
