//! Package and entry-point discovery.
//!
//! Discovery is a two-level glob: candidate package directories are matched
//! as immediate children of each search root (with one extra level for `@*`
//! scope folders), then entry-point files are matched inside each package
//! with a depth-bounded walk. The search never recurses past
//! root → scope → package, so unrelated subtrees are not visited.

use crate::paths::PathResolver;
use crate::util::{dedup_preserving, normalize_path};
use genscope_api::{GenscopeError, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Walk bound applied when a file pattern contains `**` and no explicit
/// depth was requested.
const DEFAULT_GLOB_DEPTH: usize = 8;

/// A discovered entry-point file and the package that provides it.
#[derive(Debug, Clone)]
pub struct PackageModule {
    pub file_path: PathBuf,
    pub package_path: PathBuf,
}

/// Options for [`PackageLookup::sync`].
#[derive(Debug, Clone, Default)]
pub struct PackageLookupOptions {
    /// Skip globally-installed packages.
    pub local_only: bool,
    /// Explicit package directories; when set, root discovery is skipped.
    pub package_paths: Vec<PathBuf>,
    /// Explicit search roots; computed from the path resolver when empty.
    pub npm_paths: Vec<PathBuf>,
    /// Entry-file patterns, relative to each package root.
    pub file_patterns: Vec<String>,
    /// Package-directory patterns, relative to each search root.
    pub package_patterns: Vec<String>,
    /// Visit lower-priority sources first so later results can override.
    pub reverse: bool,
    /// Explicit bound for the entry-file walk.
    pub max_depth: Option<usize>,
    /// Drop global roots that do not look like package directories.
    pub filter_paths: bool,
}

/// Enumerates installed packages and their entry-point files.
#[derive(Debug, Clone)]
pub struct PackageLookup {
    paths: PathResolver,
}

impl PackageLookup {
    pub fn new(paths: PathResolver) -> Self {
        PackageLookup { paths }
    }

    pub fn path_resolver(&self) -> &PathResolver {
        &self.paths
    }

    /// Glob entry files inside every candidate package, invoking `visitor`
    /// for each match. A visitor returning `true` stops the scan immediately
    /// and yields that single match.
    pub fn sync<F>(&self, options: &PackageLookupOptions, mut visitor: F) -> Result<Vec<PackageModule>>
    where
        F: FnMut(&PackageModule) -> bool,
    {
        debug!(?options, "running package lookup");
        let file_patterns: Vec<String> = if options.file_patterns.is_empty() {
            vec!["package.json".to_string()]
        } else {
            options.file_patterns.clone()
        };

        let mut package_paths = options.package_paths.clone();
        if package_paths.is_empty() {
            let mut npm_paths = if options.npm_paths.is_empty() {
                self.paths.npm_paths(options.local_only, options.filter_paths)
            } else {
                options.npm_paths.clone()
            };
            if options.reverse {
                npm_paths.reverse();
            }
            package_paths = self.find_packages_in(&npm_paths, &options.package_patterns)?;
        } else if options.reverse {
            package_paths.reverse();
        }

        let file_set = build_globset(&file_patterns)?;
        let max_depth = options
            .max_depth
            .unwrap_or_else(|| pattern_depth(&file_patterns));

        let mut modules = Vec::new();
        for package_path in package_paths {
            let Ok(meta) = fs::symlink_metadata(&package_path) else {
                continue;
            };
            if !meta.file_type().is_dir() && !meta.file_type().is_symlink() {
                continue;
            }
            for file_path in glob_files(&package_path, &file_set, max_depth) {
                let module = PackageModule {
                    file_path,
                    package_path: package_path.clone(),
                };
                if visitor(&module) {
                    return Ok(vec![module]);
                }
                modules.push(module);
            }
        }
        Ok(modules)
    }

    /// Enumerate candidate package directories under the given roots:
    /// immediate children matching `package_patterns`, plus one extra level
    /// inside immediate `@*` scope folders. Missing and unreadable roots are
    /// skipped, never fatal.
    pub fn find_packages_in(
        &self,
        search_paths: &[PathBuf],
        package_patterns: &[String],
    ) -> Result<Vec<PathBuf>> {
        let patterns: Vec<String> = if package_patterns.is_empty() {
            vec!["gen-*".to_string()]
        } else {
            package_patterns.to_vec()
        };
        let package_set = build_globset(&patterns)?;
        let scope_set = build_globset(&["@*".to_string()])?;

        let mut modules = Vec::new();
        for root in search_paths {
            let root = self.absolutize(root);
            let Ok(meta) = fs::symlink_metadata(&root) else {
                continue;
            };
            if !meta.file_type().is_dir() {
                continue;
            }
            let children = match sorted_dirs(&root) {
                Ok(children) => children,
                Err(err) => {
                    debug!(root = %root.display(), %err, "could not access search root");
                    continue;
                }
            };
            for child in &children {
                if matches_name(&package_set, child) {
                    modules.push(child.clone());
                }
            }
            for scope_dir in children.iter().filter(|c| matches_name(&scope_set, c)) {
                let scope_name = file_name(scope_dir);
                let grandchildren = match sorted_dirs(scope_dir) {
                    Ok(grandchildren) => grandchildren,
                    Err(err) => {
                        debug!(scope = %scope_dir.display(), %err, "could not access scope folder");
                        continue;
                    }
                };
                for package in grandchildren {
                    // Both `gen-*` and a scope-qualified hint like
                    // `@scope/gen-name` must find scoped packages.
                    let qualified = format!("{}/{}", scope_name, file_name(&package));
                    if matches_name(&package_set, &package) || package_set.is_match(&qualified) {
                        modules.push(package);
                    }
                }
            }
        }
        dedup_preserving(&mut modules);
        Ok(modules)
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.paths.cwd().join(path))
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn matches_name(set: &GlobSet, path: &Path) -> bool {
    path.file_name().is_some_and(|name| set.is_match(name))
}

/// Immediate subdirectories of `dir` (following symlinks), sorted by name
/// for deterministic priority order.
fn sorted_dirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| fs::metadata(path).is_ok_and(|m| m.is_dir()))
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn glob_files(package_path: &Path, set: &GlobSet, max_depth: usize) -> Vec<PathBuf> {
    WalkDir::new(package_path)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(package_path)
                .map(|relative| set.is_match(relative))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|err| GenscopeError::Pattern(err.to_string()))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| GenscopeError::Pattern(err.to_string()))
}

/// Bound the entry-file walk by the deepest pattern when no explicit depth
/// is given.
fn pattern_depth(patterns: &[String]) -> usize {
    patterns
        .iter()
        .map(|pattern| {
            if pattern.contains("**") {
                DEFAULT_GLOB_DEPTH
            } else {
                pattern.split(['/', '\\']).count()
            }
        })
        .max()
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::{EnvSnapshot, PathResolver};
    use std::fs;

    fn lookup_for(dir: &Path) -> PackageLookup {
        PackageLookup::new(
            PathResolver::with_env(dir, EnvSnapshot::default()).probe_package_managers(false),
        )
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn finds_packages_and_scoped_packages() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("gen-alpha")).unwrap();
        fs::create_dir_all(root.join("gen-beta")).unwrap();
        fs::create_dir_all(root.join("unrelated")).unwrap();
        fs::create_dir_all(root.join("@scope/gen-gamma")).unwrap();
        fs::create_dir_all(root.join("@scope/other")).unwrap();

        let lookup = lookup_for(root);
        let found = lookup
            .find_packages_in(&[root.to_path_buf()], &["gen-*".to_string()])
            .unwrap();
        assert_eq!(
            found,
            vec![
                root.join("gen-alpha"),
                root.join("gen-beta"),
                root.join("@scope/gen-gamma"),
            ]
        );
    }

    #[test]
    fn scope_qualified_patterns_match() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("@scope/gen-app")).unwrap();
        fs::create_dir_all(root.join("@other/gen-app")).unwrap();

        let lookup = lookup_for(root);
        let found = lookup
            .find_packages_in(&[root.to_path_buf()], &["@scope/gen-app".to_string()])
            .unwrap();
        assert_eq!(found, vec![root.join("@scope/gen-app")]);
    }

    #[test]
    fn missing_roots_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let lookup = lookup_for(temp.path());
        let found = lookup
            .find_packages_in(
                &[temp.path().join("does-not-exist")],
                &["gen-*".to_string()],
            )
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn sync_matches_file_patterns_inside_packages() {
        let temp = tempfile::tempdir().unwrap();
        let package = temp.path().join("gen-app");
        touch(&package.join("generators/web/generator.toml"));
        touch(&package.join("generators/cli/generator.toml"));
        touch(&package.join("generators/web/extra.txt"));

        let lookup = lookup_for(temp.path());
        let options = PackageLookupOptions {
            package_paths: vec![package.clone()],
            file_patterns: vec!["generators/*/generator.toml".to_string()],
            ..Default::default()
        };
        let modules = lookup.sync(&options, |_| false).unwrap();
        let files: Vec<_> = modules.iter().map(|m| m.file_path.clone()).collect();
        assert_eq!(
            files,
            vec![
                package.join("generators/cli/generator.toml"),
                package.join("generators/web/generator.toml"),
            ]
        );
        assert!(modules.iter().all(|m| m.package_path == package));
    }

    #[test]
    fn sync_short_circuits_when_visitor_accepts() {
        let temp = tempfile::tempdir().unwrap();
        let package = temp.path().join("gen-app");
        touch(&package.join("generators/a/generator.toml"));
        touch(&package.join("generators/b/generator.toml"));

        let lookup = lookup_for(temp.path());
        let options = PackageLookupOptions {
            package_paths: vec![package.clone()],
            file_patterns: vec!["generators/*/generator.toml".to_string()],
            ..Default::default()
        };
        let mut visited = 0;
        let modules = lookup
            .sync(&options, |_| {
                visited += 1;
                true
            })
            .unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(visited, 1);
        assert_eq!(
            modules[0].file_path,
            package.join("generators/a/generator.toml")
        );
    }

    #[test]
    fn sync_bounds_the_walk_depth() {
        let temp = tempfile::tempdir().unwrap();
        let package = temp.path().join("gen-app");
        touch(&package.join("index.toml"));
        touch(&package.join("nested/too/deep/index.toml"));

        let lookup = lookup_for(temp.path());
        let options = PackageLookupOptions {
            package_paths: vec![package.clone()],
            file_patterns: vec!["*.toml".to_string()],
            ..Default::default()
        };
        let modules = lookup.sync(&options, |_| false).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].file_path, package.join("index.toml"));
    }

    #[test]
    fn reverse_flips_package_order() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("gen-a");
        let b = temp.path().join("gen-b");
        touch(&a.join("generator.toml"));
        touch(&b.join("generator.toml"));

        let lookup = lookup_for(temp.path());
        let options = PackageLookupOptions {
            package_paths: vec![a.clone(), b.clone()],
            file_patterns: vec!["generator.toml".to_string()],
            reverse: true,
            ..Default::default()
        };
        let modules = lookup.sync(&options, |_| false).unwrap();
        let packages: Vec<_> = modules.iter().map(|m| m.package_path.clone()).collect();
        assert_eq!(packages, vec![b, a]);
    }
}
