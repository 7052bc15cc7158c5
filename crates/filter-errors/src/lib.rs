//! Error facade shared by the build-source-filter crates.
//!
//! Every failure carries a stable [`ErrorCode`] so build logs and JSON
//! trailers can be matched by tooling, plus an [`ErrorKind`] classifying who
//! is expected to fix it.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

/// Convenient alias for results produced by the filter crates.
pub type FilterResult<T> = Result<T, FilterError>;

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller misconfigured the pipeline (bad manifest, late registration).
    Usage,
    /// The surrounding environment failed us (filesystem, env vars).
    Environment,
    /// The build target handed us something we cannot work with.
    Target,
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidPolicyValue,
    InvalidManifest,
    RegistrationClosed,
    DuplicateMiddleware,
    MissingSourcePath,
    Io,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 6] = [
        ErrorCode::InvalidPolicyValue,
        ErrorCode::InvalidManifest,
        ErrorCode::RegistrationClosed,
        ErrorCode::DuplicateMiddleware,
        ErrorCode::MissingSourcePath,
        ErrorCode::Io,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidPolicyValue => "ERR_INVALID_POLICY_VALUE",
            ErrorCode::InvalidManifest => "ERR_INVALID_MANIFEST",
            ErrorCode::RegistrationClosed => "ERR_REGISTRATION_CLOSED",
            ErrorCode::DuplicateMiddleware => "ERR_DUPLICATE_MIDDLEWARE",
            ErrorCode::MissingSourcePath => "ERR_MISSING_SOURCE_PATH",
            ErrorCode::Io => "ERR_IO",
        }
    }

    /// Parse the string form produced by [`ErrorCode::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == value.trim())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error value carrying a code, a message and optional key/value context.
#[derive(Debug)]
pub struct FilterError {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    message: Cow<'static, str>,
    pub context: Vec<(&'static str, String)>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl FilterError {
    pub fn new(kind: ErrorKind, code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        FilterError {
            kind,
            code,
            message: message.into(),
            context: Vec::new(),
            source: None,
        }
    }

    /// Attach a key/value pair rendered alongside the message.
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_ref(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            f.write_str(" (")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl StdError for FilterError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __filter_error {
    ($kind:expr, $code:expr, $($arg:tt)+) => {
        $crate::FilterError::new($kind, $code, ::std::format!($($arg)+))
    };
}

/// Build a [`ErrorKind::Usage`] error.
#[macro_export]
macro_rules! usage {
    ($code:expr, $($arg:tt)+) => {
        $crate::__filter_error!($crate::ErrorKind::Usage, $code, $($arg)+)
    };
}

/// Build a [`ErrorKind::Environment`] error.
#[macro_export]
macro_rules! enverr {
    ($code:expr, $($arg:tt)+) => {
        $crate::__filter_error!($crate::ErrorKind::Environment, $code, $($arg)+)
    };
}

/// Build a [`ErrorKind::Target`] error.
#[macro_export]
macro_rules! target {
    ($code:expr, $($arg:tt)+) => {
        $crate::__filter_error!($crate::ErrorKind::Target, $code, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn display_includes_code_and_context() {
        let err = usage!(ErrorCode::InvalidManifest, "glob '{}' is empty", "")
            .with_context("manifest", "source-filter.toml");
        assert_eq!(err.kind, ErrorKind::Usage);
        assert_eq!(
            err.to_string(),
            "[ERR_INVALID_MANIFEST] glob '' is empty (manifest=source-filter.toml)"
        );
    }

    #[test]
    fn target_errors_are_classified() {
        let err = target!(ErrorCode::MissingSourcePath, "no path");
        assert_eq!(err.kind, ErrorKind::Target);
    }

    #[test]
    fn error_codes_parse_back() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::parse("ERR_NOPE"), None);
    }

    #[test]
    fn source_is_exposed() {
        let err = enverr!(ErrorCode::Io, "failed to read manifest")
            .with_source(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind, ErrorKind::Environment);
        assert_eq!(err.source_ref().map(|s| s.to_string()), Some("gone".to_string()));
        assert!(StdError::source(&err).is_some());
    }
}
