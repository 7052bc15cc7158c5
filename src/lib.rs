//! Build-script middleware that keeps architecture-specific sources out of
//! `cc` builds.
//!
//! A build script creates a [`BuildEnv`], registers [`HeliumFilter`] once
//! through [`BuildEnv::add_build_middleware`], and then drives the enumerated
//! sources through it. Every candidate whose lower-cased path contains
//! `helium` is dropped; everything else passes through unchanged.
//!
//! ```no_run
//! use build_source_filter::{add_source_set, BuildContext, BuildEnv, HeliumFilter, SourceSet};
//!
//! # fn main() -> build_source_filter::Result<()> {
//! build_source_filter::init_logging_with_default(build_source_filter::DEFAULT_LOG_FILTER);
//! build_source_filter::configure_policy_from_env()?;
//!
//! let mut env = BuildEnv::new(BuildContext::from_cargo_env());
//! env.add_build_middleware(HeliumFilter)?;
//!
//! let sources = SourceSet::default().root("vendor/lvgl/src");
//! let mut build = cc::Build::new();
//! add_source_set(&mut env, &mut build, &sources)?;
//! build.compile("lvgl");
//! # Ok(())
//! # }
//! ```

pub mod candidate;
pub mod compile;
pub mod errors;
pub mod exclusion;
pub mod logging;
pub mod middleware;
pub mod pipeline;
pub mod policy;
pub mod source_config;
pub mod sources;

pub use crate::candidate::{CandidateFile, SourceNode};
pub use crate::compile::{add_kept_sources, add_source_set, rerun_if_changed};
pub use crate::errors::{render_error, Result};
pub use crate::exclusion::{exclude_helium_files, ExclusionPattern, HeliumFilter, HELIUM_FILTER_NAME};
pub use crate::logging::{init_logging_with_default, DEFAULT_LOG_FILTER};
pub use crate::middleware::{from_fn, BuildMiddleware, FilterDecision, FnMiddleware};
pub use crate::pipeline::{BuildContext, BuildEnv, FilterStats};
pub use crate::policy::{configure_policy_from_env, policy_snapshot, FilterPolicy, MissingPathPolicy};
pub use crate::source_config::{discover_manifest, SourceConfig};
pub use crate::sources::{SourceKinds, SourceSet};

pub use filter_errors::{ErrorCode, ErrorKind, FilterError};
