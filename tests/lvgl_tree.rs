use std::fs;
use std::path::{Path, PathBuf};

use build_source_filter::{
    add_kept_sources, discover_manifest, BuildContext, BuildEnv, HeliumFilter, MissingPathPolicy,
    SourceConfig, SourceKinds,
};
use tempfile::{tempdir, TempDir};

const TREE: &[&str] = &[
    "lvgl/src/core/lv_obj.c",
    "lvgl/src/misc/lv_area.c",
    "lvgl/src/draw/sw/blend/helium/lv_blend_helium.S",
    "lvgl/src/draw/sw/blend/helium/lv_blend_helium.h",
    "lvgl/src/draw/sw/blend/neon/lv_blend_neon.S",
    "lvgl/src/draw/sw/blend/HELIUM_alt/lv_blend.c",
    "lvgl/src/libs/thorvg/tvgCanvas.cpp",
    "lvgl/README.md",
];

fn lvgl_tree() -> TempDir {
    let temp = tempdir().expect("tempdir");
    for relative in TREE {
        let path = temp.path().join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, b"/* generated */\n").expect("write source");
    }
    temp
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .expect("under root")
        .to_string_lossy()
        .replace('\\', "/")
}

#[test]
fn manifest_driven_build_skips_helium() {
    let temp = lvgl_tree();
    let manifest = temp.path().join("source-filter.toml");
    fs::write(
        &manifest,
        r#"
        [meta]
        name = "lvgl"
        version = 1

        [sources]
        roots = ["lvgl/src"]
        kinds = ["c", "asm"]
        "#,
    )
    .expect("write manifest");

    let config = SourceConfig::from_paths(&[manifest]).expect("load manifest");
    let sources = config.source_set().expect("source set").enumerate().expect("walk");
    assert_eq!(sources.len(), 5, "headers, docs and C++ are not enumerated");

    let mut env: BuildEnv = BuildEnv::new(config.apply_to(BuildContext::default()));
    env.add_build_middleware(HeliumFilter).expect("register");
    let mut build = cc::Build::new();
    let kept = add_kept_sources(&mut env, &mut build, sources).expect("filter");

    let root = temp.path().join("lvgl/src");
    let names: Vec<String> = kept
        .iter()
        .filter_map(|node| node.path())
        .map(|path| relative(&root, path))
        .collect();
    assert_eq!(
        names,
        vec![
            "core/lv_obj.c".to_string(),
            "draw/sw/blend/neon/lv_blend_neon.S".to_string(),
            "misc/lv_area.c".to_string(),
        ]
    );
    let files: Vec<PathBuf> = build.get_files().map(Path::to_path_buf).collect();
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|file| !file.to_string_lossy().to_lowercase().contains("helium")));

    let stats = env.stats();
    assert_eq!((stats.kept, stats.dropped), (3, 2));
}

#[test]
fn include_globs_narrow_before_filtering() {
    let temp = lvgl_tree();
    let config = SourceConfig::from_inline_and_paths(
        &[(
            "draw-only",
            &format!(
                "[meta]\nname = \"draw\"\nversion = 1\n[sources]\nroots = [{:?}]\ninclude = [\"draw/**\"]\n[pipeline]\non_missing_path = \"fail\"\n",
                temp.path().join("lvgl/src").to_string_lossy()
            ),
        )],
        &[],
    )
    .expect("compose");
    assert_eq!(config.kinds(), SourceKinds::all());
    assert_eq!(config.on_missing_path(), Some(MissingPathPolicy::Fail));

    let sources = config.source_set().expect("source set").enumerate().expect("walk");
    let mut env: BuildEnv = BuildEnv::new(config.apply_to(BuildContext::default()));
    assert_eq!(env.context().on_missing_path(), MissingPathPolicy::Fail);
    env.add_build_middleware(HeliumFilter).expect("register");
    let kept = env.filter_sources(sources).expect("filter");

    assert_eq!(kept.len(), 1);
    assert!(kept[0]
        .path()
        .map(|path| path.ends_with("neon/lv_blend_neon.S"))
        .unwrap_or(false));
}

#[test]
fn manifest_is_discovered_from_a_nested_directory() {
    let temp = lvgl_tree();
    let manifest = temp.path().join("source-filter.toml");
    fs::write(&manifest, "[meta]\nname = \"lvgl\"\nversion = 1\n[sources]\nroots = [\"lvgl/src\"]\n")
        .expect("write manifest");

    let found = discover_manifest(&temp.path().join("lvgl/src/core")).expect("discovered");
    assert_eq!(found, manifest);
    let config = SourceConfig::from_paths(&[found]).expect("load");
    assert_eq!(config.roots(), &[temp.path().join("lvgl/src")]);
}

#[test]
fn overlapping_manifest_roots_compile_each_file_once() {
    let temp = lvgl_tree();
    let base = temp.path().join("source-filter.toml");
    fs::write(&base, "[meta]\nname = \"lvgl\"\nversion = 1\n[sources]\nroots = [\"lvgl/src\"]\n")
        .expect("write base manifest");
    let core = temp.path().join("core.toml");
    fs::write(&core, "[meta]\nname = \"lvgl-core\"\nversion = 1\n[sources]\nroots = [\"lvgl/src/core\", \"lvgl/src\"]\n")
        .expect("write overlapping manifest");

    let config = SourceConfig::from_paths(&[base, core]).expect("compose");
    assert_eq!(config.roots().len(), 3);
    let sources = config.source_set().expect("source set").enumerate().expect("walk");

    let mut env: BuildEnv = BuildEnv::new(config.apply_to(BuildContext::default()));
    env.add_build_middleware(HeliumFilter).expect("register");
    let mut build = cc::Build::new();
    add_kept_sources(&mut env, &mut build, sources).expect("filter");

    let files: Vec<PathBuf> = build.get_files().map(Path::to_path_buf).collect();
    let lv_obj = files
        .iter()
        .filter(|file| file.ends_with("core/lv_obj.c"))
        .count();
    assert_eq!(lv_obj, 1);
    // lv_obj.c, lv_area.c, lv_blend_neon.S and tvgCanvas.cpp survive.
    assert_eq!(files.len(), 4);
    let stats = env.stats();
    assert_eq!((stats.kept, stats.dropped), (4, 2));
}
