//! Source enumeration: walks source roots and yields candidate files.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use bitflags::bitflags;
use filter_errors::{enverr, usage, ErrorCode};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::candidate::SourceNode;
use crate::errors::Result;

bitflags! {
    /// Languages a source file can be compiled as.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SourceKinds: u8 {
        const C = 1 << 0;
        const CXX = 1 << 1;
        const ASM = 1 << 2;
    }
}

impl SourceKinds {
    /// Classify a file extension, ignoring case; unknown extensions yield an
    /// empty set.
    ///
    /// `.S` and `.s` are both assembly (`cc` decides on preprocessing from
    /// the file name). `.C` keeps its GCC meaning of C++.
    pub fn from_extension(ext: &str) -> Self {
        if ext == "C" {
            return SourceKinds::CXX;
        }
        match ext.to_ascii_lowercase().as_str() {
            "c" => SourceKinds::C,
            "cc" | "cpp" | "cxx" | "c++" => SourceKinds::CXX,
            "s" | "asm" => SourceKinds::ASM,
            _ => SourceKinds::empty(),
        }
    }

    pub(crate) fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "c" => Some(SourceKinds::C),
            "cxx" | "cpp" | "c++" => Some(SourceKinds::CXX),
            "asm" | "assembly" => Some(SourceKinds::ASM),
            _ => None,
        }
    }
}

/// A set of source roots plus the rules selecting which files under them
/// become candidates.
#[derive(Debug, Clone)]
pub struct SourceSet {
    roots: Vec<PathBuf>,
    include: Option<GlobSet>,
    kinds: SourceKinds,
}

impl Default for SourceSet {
    fn default() -> Self {
        SourceSet::new(SourceKinds::all())
    }
}

impl SourceSet {
    pub fn new(kinds: SourceKinds) -> Self {
        SourceSet {
            roots: Vec::new(),
            include: None,
            kinds,
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Restrict candidates to files whose root-relative POSIX path matches
    /// one of `patterns`.
    pub fn include_globs<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            self.include = None;
            return Ok(self);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|err| {
                usage!(
                    ErrorCode::InvalidManifest,
                    "invalid include glob '{}': {}",
                    pattern,
                    err
                )
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|err| {
            usage!(ErrorCode::InvalidManifest, "failed to compile include globs: {}", err)
        })?;
        self.include = Some(set);
        Ok(self)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn kinds(&self) -> SourceKinds {
        self.kinds
    }

    /// Walk every root and collect candidates in a stable order.
    ///
    /// A file reachable from several (overlapping or repeated) roots is
    /// yielded once, under the first root that accepts it.
    pub fn enumerate(&self) -> Result<Vec<SourceNode>> {
        let mut nodes = Vec::new();
        let mut seen = HashSet::new();
        let mut duplicates = 0usize;
        for root in &self.roots {
            if !root.is_dir() {
                return Err(enverr!(
                    ErrorCode::Io,
                    "source root '{}' is not a directory",
                    root.display()
                ));
            }
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.map_err(|err| {
                    enverr!(
                        ErrorCode::Io,
                        "failed to walk source root '{}': {}",
                        root.display(),
                        err
                    )
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if !self.accepts(root, entry.path()) {
                    continue;
                }
                let key = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
                if seen.insert(key) {
                    nodes.push(SourceNode::new(entry.path()));
                } else {
                    duplicates += 1;
                }
            }
        }
        log::debug!(
            target: "build_source_filter::sources",
            "enumerated {} candidate(s) under {} root(s), {} reached twice",
            nodes.len(),
            self.roots.len(),
            duplicates
        );
        Ok(nodes)
    }

    fn accepts(&self, root: &Path, path: &Path) -> bool {
        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(SourceKinds::from_extension)
            .unwrap_or_else(SourceKinds::empty);
        if kind.is_empty() || !self.kinds.intersects(kind) {
            return false;
        }
        match &self.include {
            Some(globs) => {
                let relative = path.strip_prefix(root).unwrap_or(path);
                globs.is_match(to_posix(relative))
            }
            None => true,
        }
    }
}

pub(crate) fn to_posix(path: &Path) -> String {
    let mut parts = Vec::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_string_lossy());
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        fs::write(&path, "").expect("write source");
    }

    #[test]
    fn enumerate_filters_by_kind_and_glob() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "core/lv_obj.c");
        touch(root, "core/lv_obj.h");
        touch(root, "draw/sw/blend/helium/lv_blend_helium.S");
        touch(root, "draw/sw/lv_draw_sw.c");
        touch(root, "libs/thorvg/tvg.cpp");

        let set = SourceSet::new(SourceKinds::C | SourceKinds::ASM)
            .root(root)
            .include_globs(&["core/**", "draw/**"])
            .expect("globs");
        let found: Vec<String> = set
            .enumerate()
            .expect("enumerate")
            .iter()
            .filter_map(|node| node.path())
            .map(|path| to_posix(path.strip_prefix(root).expect("under root")))
            .collect();

        assert_eq!(
            found,
            vec![
                "core/lv_obj.c".to_string(),
                "draw/sw/blend/helium/lv_blend_helium.S".to_string(),
                "draw/sw/lv_draw_sw.c".to_string(),
            ]
        );
    }

    #[test]
    fn overlapping_roots_yield_each_file_once() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "src/core/lv_obj.c");
        touch(root, "src/misc/lv_area.c");

        let set = SourceSet::default()
            .root(root.join("src"))
            .root(root.join("src/core"))
            .root(root.join("src"));
        let found: Vec<String> = set
            .enumerate()
            .expect("enumerate")
            .iter()
            .filter_map(|node| node.path())
            .map(|path| to_posix(path.strip_prefix(root).expect("under root")))
            .collect();
        assert_eq!(
            found,
            vec!["src/core/lv_obj.c".to_string(), "src/misc/lv_area.c".to_string()]
        );
    }

    #[test]
    fn missing_root_is_an_environment_error() {
        let temp = tempdir().expect("tempdir");
        let set = SourceSet::default().root(temp.path().join("nope"));
        let err = set.enumerate().expect_err("missing root");
        assert_eq!(err.code, ErrorCode::Io);
    }

    #[test]
    fn bad_glob_is_rejected() {
        let err = SourceSet::default()
            .include_globs(&["src/[unclosed"])
            .expect_err("invalid glob");
        assert_eq!(err.code, ErrorCode::InvalidManifest);
    }

    #[test]
    fn extensions_classify_regardless_of_case() {
        assert_eq!(SourceKinds::from_extension("ASM"), SourceKinds::ASM);
        assert_eq!(SourceKinds::from_extension("S"), SourceKinds::ASM);
        assert_eq!(SourceKinds::from_extension("s"), SourceKinds::ASM);
        assert_eq!(SourceKinds::from_extension("CPP"), SourceKinds::CXX);
        assert_eq!(SourceKinds::from_extension("Cxx"), SourceKinds::CXX);
        assert_eq!(SourceKinds::from_extension("c"), SourceKinds::C);
        assert_eq!(SourceKinds::from_extension("C"), SourceKinds::CXX);
        assert!(SourceKinds::from_extension("H").is_empty());
    }

    #[test]
    fn upper_case_extensions_are_enumerated() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "port/startup.ASM");
        touch(root, "port/glue.CPP");
        touch(root, "port/notes.TXT");

        let found: Vec<SourceKinds> = SourceSet::default()
            .root(root)
            .enumerate()
            .expect("enumerate")
            .iter()
            .map(SourceNode::kind)
            .collect();
        assert_eq!(found, vec![SourceKinds::CXX, SourceKinds::ASM]);
    }

    #[test]
    fn kind_tokens_parse() {
        assert_eq!(SourceKinds::parse("ASM"), Some(SourceKinds::ASM));
        assert_eq!(SourceKinds::parse("c++"), Some(SourceKinds::CXX));
        assert_eq!(SourceKinds::parse("rust"), None);
    }
}
