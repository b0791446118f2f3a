//! Path resolution for every asset category.

use crate::config::Config;
use std::path::{Component, Path, PathBuf};

/// Resolved paths for one asset category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPaths {
    /// Absolute source directory.
    pub src_dir: PathBuf,
    /// Absolute glob matching the category's source files.
    pub glob: PathBuf,
    /// Absolute output directory.
    pub dist_dir: PathBuf,
    /// Sourcemap `sourceRoot`: the source directory relative to the output directory.
    pub map_root: String,
    /// Sourcemap directory relative to `dist_dir`; `None` means inline maps.
    pub map_dir: Option<String>,
}

impl CategoryPaths {
    fn new(src_dir: PathBuf, files: &str, dist_dir: PathBuf, map_dir: Option<String>) -> Self {
        let map_root = format!("./{}", to_slash(&relative_path(&dist_dir, &src_dir)));
        Self {
            glob: src_dir.join(files),
            src_dir,
            dist_dir,
            map_root,
            map_dir,
        }
    }

    /// Output path for `source`, keeping its position under `src_dir` and
    /// swapping the extension.
    #[must_use]
    pub fn output_for(&self, source: &Path, extension: &str) -> PathBuf {
        let rel = source.strip_prefix(&self.src_dir).unwrap_or(source);
        self.dist_dir.join(rel).with_extension(extension)
    }

    /// Path of `source` relative to `src_dir`, using forward slashes.
    #[must_use]
    pub fn source_name(&self, source: &Path) -> String {
        to_slash(source.strip_prefix(&self.src_dir).unwrap_or(source))
    }
}

/// The derived path set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    /// `<base>/<rootDir>`; the watched directory.
    pub root: PathBuf,
    pub style: CategoryPaths,
    pub es6: CategoryPaths,
    pub tsc: CategoryPaths,
    /// Globs whose changes force a full reload.
    pub reload: Vec<PathBuf>,
}

impl AssetPaths {
    /// Derive every path from the config, anchored at `base_dir`.
    #[must_use]
    pub fn resolve(config: &Config, base_dir: &Path) -> Self {
        let root = base_dir.join(&config.root_dir);
        let src = root.join(&config.src_dir);
        let dist = root.join(&config.dist_dir);

        let style = CategoryPaths::new(
            src.join(&config.scss_dir),
            &config.scss_files,
            dist.join(&config.css_dist),
            config.css_map.clone(),
        );
        let es6 = CategoryPaths::new(
            src.join(&config.es6_dir),
            &config.es6_files,
            dist.join(&config.js_dist),
            config.js_map.clone(),
        );
        let tsc = CategoryPaths::new(
            src.join(&config.tsc_dir),
            &config.tsc_files,
            dist.join(&config.js_dist),
            config.js_map.clone(),
        );

        let mut reload: Vec<PathBuf> = config.reload_files.iter().map(|g| root.join(g)).collect();
        reload.push(es6.dist_dir.join("**/*.js"));

        Self {
            root,
            style,
            es6,
            tsc,
            reload,
        }
    }
}

/// Relative path from directory `from` to `to`.
///
/// Both paths are treated lexically; neither needs to exist.
#[must_use]
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = normalize(from);
    let to: Vec<Component<'_>> = normalize(to);

    let shared = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in shared..from.len() {
        rel.push("..");
    }
    for component in &to[shared..] {
        rel.push(component.as_os_str());
    }
    rel
}

fn normalize(path: &Path) -> Vec<Component<'_>> {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if matches!(out.last(), Some(Component::Normal(_))) => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Render a path with `/` separators.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
        .replace("//", "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_default() -> AssetPaths {
        AssetPaths::resolve(&Config::default(), Path::new("/project"))
    }

    #[test]
    fn test_default_layout() {
        let paths = resolve_default();
        assert_eq!(paths.root, PathBuf::from("/project"));
        assert_eq!(paths.style.src_dir, PathBuf::from("/project/src/scss"));
        assert_eq!(paths.style.glob, PathBuf::from("/project/src/scss/**/*.scss"));
        assert_eq!(paths.style.dist_dir, PathBuf::from("/project/assets/css"));
        assert_eq!(paths.es6.glob, PathBuf::from("/project/src/js/**/*.js"));
        assert_eq!(paths.tsc.glob, PathBuf::from("/project/src/js/**/*.ts"));
        assert_eq!(paths.es6.dist_dir, PathBuf::from("/project/assets/js"));
    }

    #[test]
    fn test_map_roots() {
        let paths = resolve_default();
        assert_eq!(paths.style.map_root, "./../../src/scss");
        assert_eq!(paths.es6.map_root, "./../../src/js");
        assert_eq!(paths.tsc.map_root, "./../../src/js");
    }

    #[test]
    fn test_outputs_stay_under_dist_root() {
        let cfg = Config {
            root_dir: "site".to_string(),
            dist_dir: "public/build".to_string(),
            ..Config::default()
        };
        let paths = AssetPaths::resolve(&cfg, Path::new("/project"));
        let dist_root = Path::new("/project/site/public/build");
        for category in [&paths.style, &paths.es6, &paths.tsc] {
            assert!(category.dist_dir.starts_with(dist_root));
        }
    }

    #[test]
    fn test_map_root_resolves_back_to_source() {
        let cfg = Config {
            root_dir: "site".to_string(),
            dist_dir: "public/build".to_string(),
            scss_dir: "styles/scss".to_string(),
            ..Config::default()
        };
        let paths = AssetPaths::resolve(&cfg, Path::new("/project"));
        for category in [&paths.style, &paths.es6, &paths.tsc] {
            let joined = category.dist_dir.join(&category.map_root);
            let resolved: PathBuf = normalize(&joined).iter().collect();
            assert_eq!(resolved, category.src_dir);
        }
    }

    #[test]
    fn test_reload_globs_include_compiled_js() {
        let paths = resolve_default();
        assert_eq!(
            paths.reload,
            vec![
                PathBuf::from("/project/**/*.html"),
                PathBuf::from("/project/**/*.php"),
                PathBuf::from("/project/assets/js/**/*.js"),
            ]
        );
    }

    #[test]
    fn test_output_for_keeps_nesting() {
        let paths = resolve_default();
        let out = paths
            .style
            .output_for(Path::new("/project/src/scss/pages/home.scss"), "css");
        assert_eq!(out, PathBuf::from("/project/assets/css/pages/home.css"));
        assert_eq!(
            paths
                .style
                .source_name(Path::new("/project/src/scss/pages/home.scss")),
            "pages/home.scss"
        );
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/a/b/c"), Path::new("/a/d")),
            PathBuf::from("../../d")
        );
        assert_eq!(relative_path(Path::new("/a"), Path::new("/a")), PathBuf::new());
        assert_eq!(
            relative_path(Path::new("/a"), Path::new("/a/x/y")),
            PathBuf::from("x/y")
        );
    }
}
