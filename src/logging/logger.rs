use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, Once, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use filter_errors::{ErrorCode, FilterError};
use log::kv::Source as _;
use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::render_error;
use crate::policy::FilterPolicy;

thread_local! {
    static ERROR_CODE_OVERRIDE: Cell<Option<ErrorCode>> = const { Cell::new(None) };
}

static LOGGER_INSTANCE: OnceCell<&'static FilterLogger> = OnceCell::new();
static INIT_LOGGER: Once = Once::new();

/// Install the JSON-lines logger once per process.
///
/// `RUST_LOG` overrides `default_filter` when set and valid.
pub fn init_logging_with_default(default_filter: &str) {
    INIT_LOGGER.call_once(|| {
        let default_spec = FilterSpec::parse(default_filter, LevelFilter::Warn)
            .unwrap_or_else(|_| FilterSpec::new(LevelFilter::Warn));

        let initial_spec = std::env::var("RUST_LOG")
            .ok()
            .and_then(|spec| FilterSpec::parse(&spec, default_spec.global).ok())
            .unwrap_or_else(|| default_spec.clone());

        let max_level = initial_spec.max_level();
        let logger = FilterLogger::new(default_spec, initial_spec);
        let leaked: &'static FilterLogger = Box::leak(Box::new(logger));
        // Another logger may own the facade already (e.g. the host build
        // script installed env_logger); stay silent in that case.
        if log::set_logger(leaked).is_ok() {
            log::set_max_level(max_level);
            let _ = LOGGER_INSTANCE.set(leaked);
        }
    });
}

pub(crate) fn apply_logger_policy(policy: &FilterPolicy) {
    if let Some(logger) = LOGGER_INSTANCE.get() {
        logger.apply_policy(policy);
    }
}

pub fn with_error_code<F, R>(code: ErrorCode, op: F) -> R
where
    F: FnOnce() -> R,
{
    ERROR_CODE_OVERRIDE.with(|cell| {
        let previous = cell.replace(Some(code));
        let result = op();
        cell.set(previous);
        result
    })
}

/// Record the target triple the current build script is compiling for.
pub fn set_active_target(target: Option<String>) {
    if let Some(logger) = LOGGER_INSTANCE.get() {
        *write_lock(&logger.target) = target;
    }
}

/// Log `err` under its error code and, when enabled, emit its JSON trailer.
pub fn log_filter_error(label: &str, err: &FilterError) {
    let message = format!("{}: {}", label, render_error(err));
    with_error_code(err.code, || {
        log::error!(target: "build_source_filter::errors", "{}", message);
    });
    super::trailer::emit_error_trailer(err);
}

pub(crate) fn snapshot_run_and_target() -> Option<(String, Option<String>)> {
    LOGGER_INSTANCE
        .get()
        .map(|logger| (logger.run_id.clone(), logger.snapshot_target()))
}

struct FilterLogger {
    run_id: String,
    target: RwLock<Option<String>>,
    default_filter: FilterSpec,
    filter: RwLock<FilterSpec>,
    writer: Mutex<Destination>,
}

impl FilterLogger {
    fn new(default_filter: FilterSpec, initial: FilterSpec) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            target: RwLock::new(None),
            writer: Mutex::new(Destination::Stderr),
            filter: RwLock::new(initial),
            default_filter,
        }
    }

    fn apply_policy(&self, policy: &FilterPolicy) {
        let new_filter = match policy.log_level.as_deref() {
            Some(spec) if !spec.trim().is_empty() => {
                match FilterSpec::parse(spec, self.default_filter.global) {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        with_error_code(ErrorCode::InvalidPolicyValue, || {
                            log::warn!(
                                target: "build_source_filter::logging",
                                "invalid log level filter '{}'; reverting to default",
                                spec
                            );
                        });
                        self.default_filter.clone()
                    }
                }
            }
            _ => self.default_filter.clone(),
        };

        log::set_max_level(new_filter.max_level());
        *write_lock(&self.filter) = new_filter;

        let destination = match policy.log_file.as_ref() {
            Some(path) => match open_log_file(path) {
                Ok(file) => Destination::File(file),
                Err(err) => {
                    with_error_code(ErrorCode::Io, || {
                        log::warn!(
                            target: "build_source_filter::logging",
                            "failed to open log file '{}': {}",
                            path.display(),
                            err
                        );
                    });
                    Destination::Stderr
                }
            },
            None => Destination::Stderr,
        };
        *lock(&self.writer) = destination;
    }

    fn allows(&self, metadata: &Metadata<'_>) -> bool {
        match self.filter.read() {
            Ok(filter) => filter.allows(metadata),
            Err(poisoned) => poisoned.into_inner().allows(metadata),
        }
    }

    fn write_entry(&self, entry: &LogEntry<'_>) {
        match serde_json::to_vec(entry) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                if let Err(err) = lock(&self.writer).write_all(&bytes) {
                    let mut stderr = io::stderr().lock();
                    let _ = stderr.write_all(&bytes);
                    let _ = writeln!(
                        stderr,
                        "{{\"run_id\":\"{}\",\"message\":\"logger write failure: {}\"}}",
                        self.run_id, err
                    );
                }
            }
            Err(_) => {
                let mut stderr = io::stderr().lock();
                let _ = writeln!(
                    stderr,
                    "{{\"run_id\":\"{}\",\"message\":\"failed to encode log entry\"}}",
                    self.run_id
                );
            }
        }
    }

    fn snapshot_target(&self) -> Option<String> {
        match self.target.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Log for FilterLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.allows(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.allows(record.metadata()) {
            return;
        }

        let error_code = ERROR_CODE_OVERRIDE
            .with(|cell| cell.get())
            .map(|code| code.as_str());
        let mut fields = BTreeMap::new();
        let _ = record.key_values().visit(&mut FieldCollector(&mut fields));

        let target = self.snapshot_target();
        let entry = LogEntry {
            ts_micros: current_timestamp_micros(),
            level: record.level().as_str(),
            target: record.target(),
            run_id: &self.run_id,
            build_target: target.as_deref(),
            message: record.args().to_string(),
            error_code,
            module_path: record.module_path(),
            file: record.file(),
            line: record.line(),
            fields,
        };

        self.write_entry(&entry);
    }

    fn flush(&self) {
        let _ = lock(&self.writer).flush();
    }
}

struct FieldCollector<'a>(&'a mut BTreeMap<String, Value>);

impl<'kvs> log::kv::VisitSource<'kvs> for FieldCollector<'_> {
    fn visit_pair(
        &mut self,
        key: log::kv::Key<'kvs>,
        value: log::kv::Value<'kvs>,
    ) -> Result<(), log::kv::Error> {
        self.0
            .insert(key.as_str().to_string(), Value::String(value.to_string()));
        Ok(())
    }
}

#[derive(Clone)]
struct FilterSpec {
    global: LevelFilter,
    targets: Vec<(String, LevelFilter)>,
}

impl FilterSpec {
    fn new(global: LevelFilter) -> Self {
        Self {
            global,
            targets: Vec::new(),
        }
    }

    fn parse(spec: &str, default_global: LevelFilter) -> Result<Self, ()> {
        let mut filter = Self::new(default_global);
        for part in spec.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some((target, level)) = trimmed.split_once('=') {
                let lvl = LevelFilter::from_str(level.trim()).map_err(|_| ())?;
                filter.targets.push((target.trim().to_string(), lvl));
            } else {
                filter.global = LevelFilter::from_str(trimmed).map_err(|_| ())?;
            }
        }
        Ok(filter)
    }

    fn allows(&self, metadata: &Metadata<'_>) -> bool {
        let mut allowed = self.global;
        let mut matched_len = 0usize;
        let target = metadata.target();
        for (pattern, level) in &self.targets {
            let prefix_match = target == pattern
                || (target.starts_with(pattern.as_str())
                    && target[pattern.len()..].starts_with("::"));
            if prefix_match && pattern.len() > matched_len {
                matched_len = pattern.len();
                allowed = *level;
            }
        }
        allowed >= metadata.level().to_level_filter()
    }

    fn max_level(&self) -> LevelFilter {
        self.targets
            .iter()
            .fold(self.global, |acc, (_, lvl)| acc.max(*lvl))
    }
}

#[derive(Serialize)]
struct LogEntry<'a> {
    ts_micros: i128,
    level: &'a str,
    target: &'a str,
    run_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_target: Option<&'a str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, Value>,
}

fn current_timestamp_micros() -> i128 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_micros() as i128,
        Err(_) => 0,
    }
}

enum Destination {
    Stderr,
    File(File),
}

impl Destination {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Destination::Stderr => {
                let mut stderr = io::stderr().lock();
                stderr.write_all(bytes)?;
                stderr.flush()
            }
            Destination::File(file) => {
                file.write_all(bytes)?;
                file.flush()
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Destination::Stderr => io::stderr().lock().flush(),
            Destination::File(file) => file.flush(),
        }
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
