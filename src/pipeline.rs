//! Build environment hosting the middleware pipeline.
//!
//! A [`BuildEnv`] is created by the build script, receives its middleware
//! during configuration, and is then driven once over the enumerated
//! sources. The first enumeration call seals registration: middleware added
//! after files have started flowing would see only part of the build.

use std::borrow::Cow;
use std::env;

use filter_errors::{target, usage, ErrorCode};
use serde::Serialize;

use crate::candidate::{CandidateFile, SourceNode};
use crate::errors::Result;
use crate::logging;
use crate::middleware::{BuildMiddleware, FilterDecision};
use crate::policy::{policy_snapshot, MissingPathPolicy};

/// Read-only handle describing the build that is being configured.
///
/// Middleware receives it explicitly; nothing in the pipeline consults
/// ambient process state after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    target: Option<String>,
    host: Option<String>,
    on_missing_path: MissingPathPolicy,
    emit_cargo_directives: bool,
}

impl Default for BuildContext {
    fn default() -> Self {
        BuildContext {
            target: None,
            host: None,
            on_missing_path: MissingPathPolicy::Keep,
            emit_cargo_directives: false,
        }
    }
}

impl BuildContext {
    /// Context for the running build script: `TARGET`/`HOST` from Cargo,
    /// everything else from the current [`FilterPolicy`](crate::policy::FilterPolicy).
    pub fn from_cargo_env() -> Self {
        let policy = policy_snapshot();
        let target = env::var("TARGET").ok();
        logging::set_active_target(target.clone());
        BuildContext {
            target,
            host: env::var("HOST").ok(),
            on_missing_path: policy.on_missing_path,
            emit_cargo_directives: policy.emit_cargo_directives,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_missing_path_policy(mut self, policy: MissingPathPolicy) -> Self {
        self.on_missing_path = policy;
        self
    }

    pub fn with_cargo_directives(mut self, emit: bool) -> Self {
        self.emit_cargo_directives = emit;
        self
    }

    /// Target triple, informational only.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn on_missing_path(&self) -> MissingPathPolicy {
        self.on_missing_path
    }

    pub fn emit_cargo_directives(&self) -> bool {
        self.emit_cargo_directives
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Configuring,
    Enumerating,
}

/// Decision counters for one [`BuildEnv`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub kept: u64,
    pub dropped: u64,
    pub missing_path: u64,
}

impl FilterStats {
    pub fn total(&self) -> u64 {
        self.kept + self.dropped
    }

    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "sources_kept": self.kept,
            "sources_dropped": self.dropped,
            "sources_without_path": self.missing_path,
        })
    }
}

/// The host side of the "add build middleware" extension point.
pub struct BuildEnv<N = SourceNode> {
    context: BuildContext,
    middleware: Vec<Box<dyn BuildMiddleware<N>>>,
    phase: Phase,
    stats: FilterStats,
}

impl<N: CandidateFile> BuildEnv<N> {
    pub fn new(context: BuildContext) -> Self {
        BuildEnv {
            context,
            middleware: Vec::new(),
            phase: Phase::Configuring,
            stats: FilterStats::default(),
        }
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    pub fn is_sealed(&self) -> bool {
        self.phase == Phase::Enumerating
    }

    pub fn middleware_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.middleware.iter().map(|middleware| middleware.name())
    }

    /// Register `middleware` to run on every candidate.
    ///
    /// Fails once enumeration has started, or when a middleware with the
    /// same name is already registered.
    pub fn add_build_middleware<M>(&mut self, middleware: M) -> Result<()>
    where
        M: BuildMiddleware<N> + 'static,
    {
        if self.is_sealed() {
            return Err(usage!(
                ErrorCode::RegistrationClosed,
                "cannot register middleware '{}' after source enumeration started",
                middleware.name()
            )
            .with_context("middleware", middleware.name().to_string()));
        }
        if self.middleware_names().any(|name| name == middleware.name()) {
            return Err(usage!(
                ErrorCode::DuplicateMiddleware,
                "middleware '{}' is already registered",
                middleware.name()
            )
            .with_context("middleware", middleware.name().to_string()));
        }
        log::debug!(
            target: "build_source_filter::pipeline",
            "registered build middleware '{}'",
            middleware.name()
        );
        self.middleware.push(Box::new(middleware));
        Ok(())
    }

    /// Run every middleware over one candidate, in registration order.
    ///
    /// The first `Drop` wins; later middleware never sees the candidate.
    pub fn filter_one(&mut self, node: N) -> Result<FilterDecision<N>> {
        self.phase = Phase::Enumerating;

        if node.source_path().is_none() {
            self.stats.missing_path += 1;
            logging::record_missing_path();
            if self.context.on_missing_path == MissingPathPolicy::Fail {
                let err = target!(
                    ErrorCode::MissingSourcePath,
                    "candidate source has no retrievable path"
                )
                .with_context("policy", MissingPathPolicy::Fail.as_str());
                logging::log_filter_error("source enumeration aborted", &err);
                return Err(err);
            }
        }

        let label = if log::log_enabled!(target: "build_source_filter::pipeline", log::Level::Debug)
        {
            node.source_path().map(Cow::into_owned)
        } else {
            None
        };

        let mut current = node;
        for middleware in &self.middleware {
            match middleware.apply(&self.context, current) {
                FilterDecision::Keep(next) => current = next,
                FilterDecision::Drop => {
                    self.stats.dropped += 1;
                    logging::record_dropped(middleware.name());
                    log::debug!(
                        target: "build_source_filter::pipeline",
                        "'{}' excluded {}",
                        middleware.name(),
                        label.as_deref().unwrap_or("<unknown path>")
                    );
                    return Ok(FilterDecision::Drop);
                }
            }
        }

        self.stats.kept += 1;
        logging::record_kept();
        Ok(FilterDecision::Keep(current))
    }

    /// Filter a whole enumeration, returning kept candidates in input order.
    pub fn filter_sources<I>(&mut self, sources: I) -> Result<Vec<N>>
    where
        I: IntoIterator<Item = N>,
    {
        let before = self.stats;
        let mut kept = Vec::new();
        for node in sources {
            if let FilterDecision::Keep(node) = self.filter_one(node)? {
                kept.push(node);
            }
        }
        // `filter_one` seals too, but an empty enumeration must also close
        // registration.
        self.phase = Phase::Enumerating;

        let dropped = self.stats.dropped - before.dropped;
        let totals = self.stats.summary_json().to_string();
        log::info!(
            target: "build_source_filter::pipeline",
            kept = kept.len() as u64,
            dropped = dropped,
            totals = totals.as_str();
            "kept {} source(s), dropped {} for target {}",
            kept.len(),
            dropped,
            self.context.target().unwrap_or("<unknown>")
        );
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::{exclude_helium_files, HeliumFilter, HELIUM_FILTER_NAME};
    use crate::logging::test_support::{self, MetricEvent};
    use crate::middleware::from_fn;
    use crate::sources::SourceKinds;

    fn helium_env() -> BuildEnv {
        let mut env = BuildEnv::new(BuildContext::default().with_target("xtensa-esp32-none-elf"));
        env.add_build_middleware(HeliumFilter).expect("register");
        env
    }

    #[test]
    fn helium_sources_are_removed_in_order() {
        let mut env = helium_env();
        let kept = env
            .filter_sources([
                SourceNode::new("lvgl/src/core/lv_obj.c"),
                SourceNode::new("lvgl/src/draw/sw/blend/helium/lv_blend_helium.S"),
                SourceNode::new("lvgl/src/draw/sw/blend/neon/lv_blend_neon.S"),
                SourceNode::new("Drivers/HELIUM/asm.S"),
            ])
            .expect("filter");
        let paths: Vec<_> = kept
            .iter()
            .filter_map(|node| node.path())
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            paths,
            vec![
                "lvgl/src/core/lv_obj.c".to_string(),
                "lvgl/src/draw/sw/blend/neon/lv_blend_neon.S".to_string(),
            ]
        );
        assert_eq!(
            env.stats(),
            FilterStats {
                kept: 2,
                dropped: 2,
                missing_path: 0
            }
        );
    }

    #[test]
    fn registration_closes_once_enumeration_starts() {
        let mut env = helium_env();
        env.filter_sources(Vec::<SourceNode>::new()).expect("empty pass");
        assert!(env.is_sealed());
        let err = env
            .add_build_middleware(from_fn("late", |_: &BuildContext, node: SourceNode| {
                FilterDecision::Keep(node)
            }))
            .expect_err("sealed");
        assert_eq!(err.code, ErrorCode::RegistrationClosed);
        assert_eq!(err.context, vec![("middleware", "late".to_string())]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut env = helium_env();
        let err = env
            .add_build_middleware(from_fn(HELIUM_FILTER_NAME, exclude_helium_files::<SourceNode>))
            .expect_err("duplicate");
        assert_eq!(err.code, ErrorCode::DuplicateMiddleware);
        assert_eq!(env.middleware_names().collect::<Vec<_>>(), vec![HELIUM_FILTER_NAME]);
    }

    #[test]
    fn first_drop_short_circuits() {
        let mut env: BuildEnv<&'static str> = BuildEnv::new(BuildContext::default());
        env.add_build_middleware(HeliumFilter).expect("register");
        env.add_build_middleware(from_fn("never_sees_helium", |_: &BuildContext, node: &'static str| {
            assert!(!node.contains("helium"), "dropped candidate leaked: {node}");
            FilterDecision::Keep(node)
        }))
        .expect("register");
        let kept = env
            .filter_sources(["a/helium/x.S", "a/core/y.c"])
            .expect("filter");
        assert_eq!(kept, vec!["a/core/y.c"]);
    }

    #[test]
    fn pathless_candidates_follow_policy() {
        let mut keep = helium_env();
        let kept = keep
            .filter_sources([SourceNode::detached(SourceKinds::ASM)])
            .expect("keep policy");
        assert_eq!(kept.len(), 1);
        assert_eq!(keep.stats().missing_path, 1);

        let mut fail: BuildEnv = BuildEnv::new(
            BuildContext::default().with_missing_path_policy(MissingPathPolicy::Fail),
        );
        fail.add_build_middleware(HeliumFilter).expect("register");
        let err = fail
            .filter_sources([
                SourceNode::new("a/core/y.c"),
                SourceNode::detached(SourceKinds::C),
            ])
            .expect_err("fail policy");
        assert_eq!(err.code, ErrorCode::MissingSourcePath);
    }

    #[test]
    fn decisions_reach_metrics_sink() {
        let metrics = test_support::install();
        let mut env = helium_env();
        let _ = env
            .filter_sources([SourceNode::new("only/helium/one.S")])
            .expect("filter");
        let events = metrics.take();
        assert!(events.contains(&MetricEvent::Dropped(HELIUM_FILTER_NAME.to_string())));
    }

    #[test]
    fn stats_summary_is_json() {
        let stats = FilterStats {
            kept: 3,
            dropped: 1,
            missing_path: 0,
        };
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.summary_json()["sources_dropped"], 1);
    }
}
