//! Source manifest loader (TOML ingestion, aggregation).

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use filter_errors::{enverr, usage, ErrorCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::policy::MissingPathPolicy;
use crate::source_config::model::{ManifestMeta, ManifestSource, SourceConfig};
use crate::sources::SourceKinds;

/// Aggregates inline and file manifests into a resolved configuration.
///
/// Roots and include globs accumulate across manifests; `kinds` and
/// `on_missing_path` are overridden by the last manifest that sets them.
#[derive(Default)]
pub struct ConfigAggregator {
    roots: Vec<PathBuf>,
    include: Vec<String>,
    kinds: Option<SourceKinds>,
    on_missing_path: Option<MissingPathPolicy>,
    sources: Vec<ManifestSource>,
}

impl ConfigAggregator {
    pub fn ingest_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path).map_err(|err| {
            enverr!(
                ErrorCode::Io,
                "failed to read source manifest '{}'",
                path.display()
            )
            .with_source(err)
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.ingest_source(path, &base_dir, &contents)
    }

    /// Ingest an inline manifest; relative roots resolve against the
    /// current directory.
    pub fn ingest_inline(&mut self, label: &str, contents: &str) -> Result<()> {
        let pseudo_path = PathBuf::from(format!("<inline:{label}>"));
        self.ingest_source(&pseudo_path, Path::new("."), contents)
    }

    pub fn finish(self) -> Result<SourceConfig> {
        if self.roots.is_empty() {
            return Err(usage!(
                ErrorCode::InvalidManifest,
                "composed manifests never set 'sources.roots'"
            ));
        }
        Ok(SourceConfig {
            roots: self.roots,
            include: self.include,
            kinds: self.kinds.unwrap_or_else(SourceKinds::all),
            on_missing_path: self.on_missing_path,
            sources: self.sources,
        })
    }

    fn ingest_source(&mut self, path: &Path, base_dir: &Path, contents: &str) -> Result<()> {
        let raw: RawManifest = toml::from_str(contents).map_err(|err| {
            usage!(
                ErrorCode::InvalidManifest,
                "failed to parse source manifest '{}': {}",
                path.display(),
                err
            )
        })?;

        // Nothing below may fail once `self` is touched.
        let meta = parse_meta(&raw.meta, path)?;
        let mut roots = Vec::new();
        let mut include = Vec::new();
        let mut kinds = None;
        if let Some(sources) = raw.sources.as_ref() {
            for root in sources.roots.iter().flatten() {
                roots.push(resolve_root(root, base_dir, path)?);
            }
            for glob in sources.include.iter().flatten() {
                if glob.trim().is_empty() {
                    return Err(usage!(
                        ErrorCode::InvalidManifest,
                        "empty include glob in '{}'",
                        path.display()
                    ));
                }
                include.push(glob.clone());
            }
            if let Some(tokens) = sources.kinds.as_ref() {
                kinds = Some(parse_kinds(tokens, path)?);
            }
        }

        let on_missing_path = match raw
            .pipeline
            .as_ref()
            .and_then(|pipeline| pipeline.on_missing_path.as_deref())
        {
            None | Some("inherit") => None,
            Some(value) => Some(
                MissingPathPolicy::from_str(value)
                    .map_err(|err| err.0.with_context("manifest", path.display().to_string()))?,
            ),
        };

        // Commit.
        self.roots.extend(roots);
        self.include.extend(include);
        if kinds.is_some() {
            self.kinds = kinds;
        }
        if on_missing_path.is_some() {
            self.on_missing_path = on_missing_path;
        }
        self.sources.push(ManifestSource {
            path: path.to_path_buf(),
            sha256: calculate_sha256(contents),
            meta,
        });
        Ok(())
    }
}

pub(crate) fn calculate_sha256(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn parse_meta(raw: &RawMeta, path: &Path) -> Result<ManifestMeta> {
    if raw.name.trim().is_empty() {
        return Err(usage!(
            ErrorCode::InvalidManifest,
            "'meta.name' must not be empty in '{}'",
            path.display()
        ));
    }
    if raw.version < 1 {
        return Err(usage!(
            ErrorCode::InvalidManifest,
            "'meta.version' must be >= 1 in '{}'",
            path.display()
        ));
    }
    Ok(ManifestMeta {
        name: raw.name.clone(),
        version: raw.version,
        description: raw.description.clone(),
    })
}

fn parse_kinds(tokens: &[String], path: &Path) -> Result<SourceKinds> {
    let mut kinds = SourceKinds::empty();
    for token in tokens {
        let kind = SourceKinds::parse(token).ok_or_else(|| {
            usage!(
                ErrorCode::InvalidManifest,
                "unsupported source kind '{}' in '{}'",
                token,
                path.display()
            )
        })?;
        kinds |= kind;
    }
    if kinds.is_empty() {
        return Err(usage!(
            ErrorCode::InvalidManifest,
            "'sources.kinds' must name at least one kind in '{}'",
            path.display()
        ));
    }
    Ok(kinds)
}

fn resolve_root(raw: &str, base_dir: &Path, manifest: &Path) -> Result<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(usage!(
            ErrorCode::InvalidManifest,
            "empty source root in '{}'",
            manifest.display()
        ));
    }
    let root = Path::new(trimmed);
    if root.is_absolute() {
        return Ok(root.to_path_buf());
    }
    let mut resolved = base_dir.to_path_buf();
    for component in root.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => resolved.push(".."),
            Component::Normal(part) => resolved.push(part),
            Component::Prefix(_) | Component::RootDir => {}
        }
    }
    Ok(resolved)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    meta: RawMeta,
    #[serde(default)]
    sources: Option<RawSources>,
    #[serde(default)]
    pipeline: Option<RawPipeline>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMeta {
    name: String,
    version: u32,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSources {
    #[serde(default)]
    roots: Option<Vec<String>>,
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    kinds: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPipeline {
    #[serde(default)]
    on_missing_path: Option<String>,
}
