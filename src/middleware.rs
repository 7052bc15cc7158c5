//! Build middleware: per-candidate hooks run during source enumeration.

use crate::candidate::CandidateFile;
use crate::pipeline::BuildContext;

/// Outcome of running middleware over one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum FilterDecision<N> {
    /// Pass the candidate through unchanged.
    Keep(N),
    /// Exclude the candidate from compilation.
    Drop,
}

impl<N> FilterDecision<N> {
    pub fn is_keep(&self) -> bool {
        matches!(self, FilterDecision::Keep(_))
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, FilterDecision::Drop)
    }

    pub fn into_kept(self) -> Option<N> {
        match self {
            FilterDecision::Keep(node) => Some(node),
            FilterDecision::Drop => None,
        }
    }
}

/// Hosts that model exclusion as "return nothing" map onto `Drop`.
impl<N> From<Option<N>> for FilterDecision<N> {
    fn from(value: Option<N>) -> Self {
        match value {
            Some(node) => FilterDecision::Keep(node),
            None => FilterDecision::Drop,
        }
    }
}

/// A hook registered with [`BuildEnv::add_build_middleware`](crate::pipeline::BuildEnv::add_build_middleware).
///
/// Implementations must be pure with respect to the candidate: no I/O, no
/// mutation, and the same decision for the same path every time.
pub trait BuildMiddleware<N> {
    /// Registration key; the pipeline refuses two middleware with one name.
    fn name(&self) -> &str;

    fn apply(&self, ctx: &BuildContext, node: N) -> FilterDecision<N>;
}

/// Middleware backed by a plain function or closure.
pub struct FnMiddleware<F> {
    name: String,
    func: F,
}

/// Wrap `func` as middleware registered under `name`.
pub fn from_fn<N, F>(name: impl Into<String>, func: F) -> FnMiddleware<F>
where
    N: CandidateFile,
    F: Fn(&BuildContext, N) -> FilterDecision<N>,
{
    FnMiddleware {
        name: name.into(),
        func,
    }
}

impl<N, F> BuildMiddleware<N> for FnMiddleware<F>
where
    N: CandidateFile,
    F: Fn(&BuildContext, N) -> FilterDecision<N>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, ctx: &BuildContext, node: N) -> FilterDecision<N> {
        (self.func)(ctx, node)
    }
}
