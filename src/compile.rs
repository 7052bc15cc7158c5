//! Hand-off of kept sources to `cc`.

use std::io::{self, Write};
use std::path::Path;

use crate::candidate::{CandidateFile, SourceNode};
use crate::errors::Result;
use crate::pipeline::BuildEnv;
use crate::sources::SourceSet;

/// Filter `sources` through `env` and add every kept file to `build`.
///
/// Kept candidates are returned so callers can inspect or log them; a kept
/// candidate without a path cannot be compiled and is skipped with a warning.
///
/// Only kept files are watched. Use [`add_source_set`] when new files
/// appearing under a root must also re-run the build script.
pub fn add_kept_sources<N, I>(env: &mut BuildEnv<N>, build: &mut cc::Build, sources: I) -> Result<Vec<N>>
where
    N: CandidateFile,
    I: IntoIterator<Item = N>,
{
    add_kept_sources_to(env, build, sources, &mut io::stdout().lock())
}

/// Enumerate `set`, filter it through `env`, and add the kept files to
/// `build`.
///
/// With Cargo directives enabled every root is watched as well as every kept
/// file: once a build script prints `rerun-if-changed`, Cargo stops watching
/// the package as a whole.
pub fn add_source_set(env: &mut BuildEnv, build: &mut cc::Build, set: &SourceSet) -> Result<Vec<SourceNode>> {
    add_source_set_to(env, build, set, &mut io::stdout().lock())
}

/// Cargo directive asking for a rebuild when `path` changes.
pub fn rerun_if_changed(path: &Path) -> String {
    format!("cargo:rerun-if-changed={}", path.display())
}

fn add_kept_sources_to<N, I, W>(
    env: &mut BuildEnv<N>,
    build: &mut cc::Build,
    sources: I,
    out: &mut W,
) -> Result<Vec<N>>
where
    N: CandidateFile,
    I: IntoIterator<Item = N>,
    W: Write,
{
    let kept = env.filter_sources(sources)?;
    let emit = env.context().emit_cargo_directives();
    for node in &kept {
        let Some(path) = node.source_path() else {
            log::warn!(
                target: "build_source_filter::compile",
                "kept candidate has no path; it cannot be passed to cc"
            );
            continue;
        };
        let path = Path::new(path.as_ref());
        build.file(path);
        if emit {
            emit_directive(out, &rerun_if_changed(path));
        }
    }
    Ok(kept)
}

fn add_source_set_to<W: Write>(
    env: &mut BuildEnv,
    build: &mut cc::Build,
    set: &SourceSet,
    out: &mut W,
) -> Result<Vec<SourceNode>> {
    if env.context().emit_cargo_directives() {
        for root in set.roots() {
            emit_directive(out, &rerun_if_changed(root));
        }
    }
    let sources = set.enumerate()?;
    add_kept_sources_to(env, build, sources, out)
}

fn emit_directive<W: Write>(out: &mut W, directive: &str) {
    if let Err(err) = writeln!(out, "{directive}") {
        log::warn!(
            target: "build_source_filter::compile",
            "failed to print '{}': {}",
            directive,
            err
        );
    }
}
