//! The Helium path filter.
//!
//! LVGL ships ARM Helium (M-profile vector extension) blend routines as
//! assembly under directories named `helium`. Targets without MVE cannot
//! assemble them, so builds for those targets register this filter and the
//! files never reach `cc`.
//!
//! Matching is a case-insensitive substring test over the whole path, not a
//! path-component test: `src/helium_extra/file.c` is excluded too.

use crate::candidate::CandidateFile;
use crate::middleware::{BuildMiddleware, FilterDecision};
use crate::pipeline::BuildContext;

/// Name under which [`HeliumFilter`] registers itself.
pub const HELIUM_FILTER_NAME: &str = "exclude_helium_files";

/// Lower-case substring identifying an excluded subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionPattern(&'static str);

impl ExclusionPattern {
    pub const HELIUM: ExclusionPattern = ExclusionPattern("helium");

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn matches(&self, path: &str) -> bool {
        path.to_lowercase().contains(self.0)
    }

    /// Decide for one candidate. Candidates without a path are kept.
    pub fn decide<N: CandidateFile>(&self, node: N) -> FilterDecision<N> {
        let excluded = node
            .source_path()
            .map(|path| self.matches(&path))
            .unwrap_or(false);
        if excluded {
            FilterDecision::Drop
        } else {
            FilterDecision::Keep(node)
        }
    }
}

/// Drop every candidate whose path mentions Helium.
///
/// The build context is accepted so the function can be registered directly
/// via [`from_fn`](crate::middleware::from_fn); the decision never depends
/// on it.
pub fn exclude_helium_files<N: CandidateFile>(_ctx: &BuildContext, node: N) -> FilterDecision<N> {
    ExclusionPattern::HELIUM.decide(node)
}

/// [`exclude_helium_files`] as a middleware value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeliumFilter;

impl<N: CandidateFile> BuildMiddleware<N> for HeliumFilter {
    fn name(&self) -> &str {
        HELIUM_FILTER_NAME
    }

    fn apply(&self, ctx: &BuildContext, node: N) -> FilterDecision<N> {
        exclude_helium_files(ctx, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SourceNode;
    use crate::sources::SourceKinds;
    use std::path::PathBuf;

    fn decide(path: &str) -> FilterDecision<PathBuf> {
        exclude_helium_files(&BuildContext::default(), PathBuf::from(path))
    }

    #[test]
    fn helium_paths_are_dropped_in_any_case() {
        for path in [
            "Drivers/HELIUM/asm.S",
            "Drivers/Helium/asm.c",
            "Drivers/helium/asm.S",
            "lib/lvgl/src/draw/sw/blend/helium/lv_blend_helium.S",
        ] {
            assert!(decide(path).is_drop(), "{path} should be dropped");
        }
    }

    #[test]
    fn substring_match_is_not_limited_to_components() {
        assert!(decide("src/helium_extra/file.c").is_drop());
        assert!(decide("src/draw/lv_draw_heliumfast.c").is_drop());
    }

    #[test]
    fn other_paths_are_kept_unchanged() {
        let node = SourceNode::new("Drivers/Common/core.c");
        let kept = exclude_helium_files(&BuildContext::default(), node.clone());
        assert_eq!(kept, FilterDecision::Keep(node));
        assert!(decide("lib/lvgl/src/draw/sw/blend/neon/lv_blend_neon.S").is_keep());
    }

    #[test]
    fn decision_is_stable_across_calls() {
        for _ in 0..3 {
            assert!(decide("Drivers/HELIUM/asm.S").is_drop());
            assert!(decide("Drivers/Common/core.c").is_keep());
        }
    }

    #[test]
    fn pathless_candidates_are_kept() {
        let node = SourceNode::detached(SourceKinds::ASM);
        assert_eq!(
            exclude_helium_files(&BuildContext::default(), node.clone()),
            FilterDecision::Keep(node)
        );
    }

    #[test]
    fn reference_identity_is_preserved() {
        let owned = PathBuf::from("Drivers/Common/core.c");
        let kept = HeliumFilter
            .apply(&BuildContext::default(), &owned)
            .into_kept()
            .expect("kept");
        assert!(std::ptr::eq(kept, &owned));
    }
}
