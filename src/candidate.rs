//! Candidate file references handed to build middleware.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::sources::SourceKinds;

/// A per-file handle produced during source enumeration.
///
/// The only thing middleware may ask of a candidate is its path. A handle
/// that cannot produce one returns `None`; the pipeline decides what that
/// means (see [`MissingPathPolicy`](crate::policy::MissingPathPolicy)).
pub trait CandidateFile {
    fn source_path(&self) -> Option<Cow<'_, str>>;
}

impl<T: CandidateFile + ?Sized> CandidateFile for &T {
    fn source_path(&self) -> Option<Cow<'_, str>> {
        (**self).source_path()
    }
}

impl CandidateFile for Path {
    fn source_path(&self) -> Option<Cow<'_, str>> {
        Some(self.to_string_lossy())
    }
}

impl CandidateFile for PathBuf {
    fn source_path(&self) -> Option<Cow<'_, str>> {
        Some(self.to_string_lossy())
    }
}

impl CandidateFile for str {
    fn source_path(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self))
    }
}

impl CandidateFile for String {
    fn source_path(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

/// Source file discovered by [`SourceSet`](crate::sources::SourceSet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    path: Option<PathBuf>,
    kind: SourceKinds,
}

impl SourceNode {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(SourceKinds::from_extension)
            .unwrap_or_else(SourceKinds::empty);
        SourceNode {
            path: Some(path),
            kind,
        }
    }

    /// A node whose path is unknown, e.g. one synthesised by another tool.
    pub fn detached(kind: SourceKinds) -> Self {
        SourceNode { path: None, kind }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn kind(&self) -> SourceKinds {
        self.kind
    }

    pub fn into_path(self) -> Option<PathBuf> {
        self.path
    }
}

impl CandidateFile for SourceNode {
    fn source_path(&self) -> Option<Cow<'_, str>> {
        self.path.as_deref().map(Path::to_string_lossy)
    }
}
