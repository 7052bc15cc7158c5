//! Source manifest data models.

use std::path::PathBuf;

use serde::Serialize;

use crate::errors::Result;
use crate::pipeline::BuildContext;
use crate::policy::MissingPathPolicy;
use crate::sources::{SourceKinds, SourceSet};

/// `[meta]` table of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestMeta {
    pub name: String,
    pub version: u32,
    pub description: Option<String>,
}

/// One manifest that contributed to a composed [`SourceConfig`].
#[derive(Debug, Clone)]
pub struct ManifestSource {
    pub path: PathBuf,
    pub sha256: String,
    pub meta: ManifestMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub entries: Vec<ConfigSummaryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummaryEntry {
    pub path: PathBuf,
    pub sha256: String,
    pub name: String,
    pub version: u32,
}

/// Composed manifest chain ready to drive enumeration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub(crate) roots: Vec<PathBuf>,
    pub(crate) include: Vec<String>,
    pub(crate) kinds: SourceKinds,
    pub(crate) on_missing_path: Option<MissingPathPolicy>,
    pub(crate) sources: Vec<ManifestSource>,
}

impl SourceConfig {
    /// Source roots, already resolved against their manifest's directory.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn kinds(&self) -> SourceKinds {
        self.kinds
    }

    pub fn on_missing_path(&self) -> Option<MissingPathPolicy> {
        self.on_missing_path
    }

    pub fn sources(&self) -> &[ManifestSource] {
        &self.sources
    }

    pub fn summary(&self) -> ConfigSummary {
        let entries = self
            .sources
            .iter()
            .map(|source| ConfigSummaryEntry {
                path: source.path.clone(),
                sha256: source.sha256.clone(),
                name: source.meta.name.clone(),
                version: source.meta.version,
            })
            .collect();
        ConfigSummary { entries }
    }

    /// Build the enumeration described by the manifests.
    pub fn source_set(&self) -> Result<SourceSet> {
        let set = self
            .roots
            .iter()
            .fold(SourceSet::new(self.kinds), |set, root| set.root(root.clone()));
        set.include_globs(&self.include)
    }

    /// Overlay manifest settings onto `ctx`.
    pub fn apply_to(&self, ctx: BuildContext) -> BuildContext {
        match self.on_missing_path {
            Some(policy) => ctx.with_missing_path_policy(policy),
            None => ctx,
        }
    }
}
