//! Source manifest facade: composes inline and file-based manifests into a
//! resolved [`SourceConfig`].

mod loader;
mod model;

pub use loader::ConfigAggregator;
pub use model::{ConfigSummary, ConfigSummaryEntry, ManifestMeta, ManifestSource, SourceConfig};

use std::path::{Path, PathBuf};

use filter_errors::{usage, ErrorCode};

use crate::errors::Result;

/// File name looked up by [`discover_manifest`].
pub const MANIFEST_FILE_NAME: &str = "source-filter.toml";

impl SourceConfig {
    /// Load and compose manifests from the provided paths.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        Self::from_inline_and_paths(&[], paths)
    }

    /// Load and compose manifests from inline TOML combined with paths.
    ///
    /// Inline entries are ingested first in the order provided, followed by files.
    pub fn from_inline_and_paths(inline: &[(&str, &str)], paths: &[PathBuf]) -> Result<Self> {
        if inline.is_empty() && paths.is_empty() {
            return Err(usage!(
                ErrorCode::InvalidManifest,
                "no source manifests supplied"
            ));
        }

        let mut aggregator = ConfigAggregator::default();
        for (label, contents) in inline {
            aggregator.ingest_inline(label, contents)?;
        }
        for path in paths {
            aggregator.ingest_file(path)?;
        }

        let config = aggregator.finish()?;
        for source in config.sources() {
            log::debug!(
                target: "build_source_filter::source_config",
                "loaded manifest '{}' v{} from {} (sha256 {})",
                source.meta.name,
                source.meta.version,
                source.path.display(),
                source.sha256
            );
        }
        Ok(config)
    }
}

/// Walk up from `start` looking for a `source-filter.toml`.
pub fn discover_manifest(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_FILE_NAME))
        .find(|candidate| candidate.is_file())
}
