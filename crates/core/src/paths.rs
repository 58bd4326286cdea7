//! Search-root computation for package lookups.
//!
//! Candidate roots are `node_modules` directories: one per ancestor of the
//! working directory, plus the platform's global install locations. The full
//! list is ordered most-local-first; callers reverse it when they want later
//! registrations to win.

use crate::util::{command_output, dedup_preserving};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory names a global root is expected to end with. Candidates failing
/// this check are dropped when strict filtering is requested.
const VALID_ROOT_SUFFIXES: &[&str] = &["node_modules", ".node_modules", ".node_libraries", "node"];

/// Process-environment state consulted for global roots, captured once at
/// construction so resolution does not depend on later environment mutation.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    /// Extra search roots (`NODE_PATH`), platform path-delimiter separated.
    pub node_path: Option<String>,
    /// Version-manager install root (`NVM_HOME`).
    pub nvm_home: Option<PathBuf>,
    /// Version-manager helper path (`NVM_PATH`).
    pub nvm_path: Option<PathBuf>,
    /// Desktop profile data directory (`APPDATA`, windows only).
    pub appdata: Option<PathBuf>,
    /// Location of the running executable.
    pub exe_path: Option<PathBuf>,
    pub windows: bool,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        EnvSnapshot {
            node_path: env::var("NODE_PATH").ok().filter(|s| !s.is_empty()),
            nvm_home: env::var_os("NVM_HOME").map(PathBuf::from),
            nvm_path: env::var_os("NVM_PATH").map(PathBuf::from),
            appdata: env::var_os("APPDATA").map(PathBuf::from),
            exe_path: env::current_exe().ok(),
            windows: cfg!(windows),
        }
    }
}

/// Computes the ordered list of candidate root directories to search.
#[derive(Debug, Clone)]
pub struct PathResolver {
    cwd: PathBuf,
    env: EnvSnapshot,
    probe_package_managers: bool,
}

impl PathResolver {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self::with_env(cwd, EnvSnapshot::capture())
    }

    /// Build a resolver from an explicit environment snapshot.
    pub fn with_env(cwd: impl Into<PathBuf>, env: EnvSnapshot) -> Self {
        PathResolver {
            cwd: cwd.into(),
            env,
            probe_package_managers: true,
        }
    }

    /// Enable or disable best-effort `yarn`/`npm` command probing.
    pub fn probe_package_managers(mut self, enabled: bool) -> Self {
        self.probe_package_managers = enabled;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// `node_modules` child of every ancestor of the working directory,
    /// deepest (most specific) first.
    pub fn local_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .cwd
            .ancestors()
            .map(|dir| dir.join("node_modules"))
            .collect();
        dedup_preserving(&mut roots);
        roots
    }

    /// Global install roots, highest priority first.
    pub fn global_roots(&self, filter_paths: bool) -> Vec<PathBuf> {
        // Built lowest-priority-first, reversed once at the end.
        let mut paths: Vec<PathBuf> = Vec::new();

        // A version-manager install replaces the platform defaults.
        if let Some(nvm_home) = &self.env.nvm_home {
            paths.extend(version_manager_roots(nvm_home));
        } else if self.env.windows {
            if let Some(appdata) = &self.env.appdata {
                paths.push(appdata.join("npm/node_modules"));
            }
        } else {
            paths.push(PathBuf::from("/usr/lib/node_modules"));
            paths.push(PathBuf::from("/usr/local/lib/node_modules"));
        }

        if let Some(parent) = self.env.nvm_path.as_deref().and_then(Path::parent) {
            paths.push(parent.join("node_modules"));
        }

        if filter_paths {
            paths.retain(|path| has_valid_root_suffix(path));
        }

        // Extra roots from the environment go in front and are exempt from
        // suffix filtering.
        let delimiter = if self.env.windows { ';' } else { ':' };
        let mut all: Vec<PathBuf> = self
            .env
            .node_path
            .as_deref()
            .map(|raw| {
                raw.split(delimiter)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();
        all.extend(paths);

        // Install roots of the running tool itself: four levels up covers a
        // nested-dependency install, two levels up a direct one.
        if let Some(exe_dir) = self.env.exe_path.as_deref().and_then(Path::parent) {
            for levels in [4, 2] {
                if let Some(root) = exe_dir.ancestors().nth(levels) {
                    if !filter_paths || has_valid_root_suffix(root) {
                        all.push(root.to_path_buf());
                    }
                }
            }
        }

        if let Some(yarn_base) = self.yarn_global_base() {
            let mut yarn_paths = vec![yarn_base.join("node_modules")];
            if let Some(parent) = yarn_base.parent() {
                yarn_paths.push(parent.join("link"));
            }
            for path in yarn_paths {
                if !filter_paths || has_valid_root_suffix(&path) {
                    all.push(path);
                }
            }
        }

        if let Some(npm_root) = self.npm_global_root() {
            if !filter_paths || has_valid_root_suffix(&npm_root) {
                all.push(npm_root);
            }
        }

        all.reverse();
        dedup_preserving(&mut all);
        all
    }

    /// Full ordered search list: local roots, then globals unless
    /// `local_only`.
    pub fn npm_paths(&self, local_only: bool, filter_paths: bool) -> Vec<PathBuf> {
        let mut paths = self.local_roots();
        if !local_only {
            paths.extend(self.global_roots(filter_paths));
        }
        dedup_preserving(&mut paths);
        paths
    }

    /// Yarn's global directory: asked from the tool itself when probing is
    /// enabled, otherwise the platform's static config base. Either way the
    /// directory must exist to contribute.
    fn yarn_global_base(&self) -> Option<PathBuf> {
        if self.probe_package_managers {
            if let Some(out) = command_output("yarn", &["global", "dir"]) {
                return Some(PathBuf::from(out));
            }
        }
        let base = if self.env.windows {
            self.env.appdata.as_ref().map(|a| a.join("Yarn/config/global"))
        } else if cfg!(target_os = "macos") {
            dirs::home_dir().map(|h| h.join(".config/yarn/global"))
        } else {
            Some(PathBuf::from("/usr/local/share/.config/yarn/global"))
        };
        base.filter(|b| b.exists())
    }

    fn npm_global_root(&self) -> Option<PathBuf> {
        if !self.probe_package_managers {
            return None;
        }
        command_output("npm", &["root", "-g"]).map(PathBuf::from)
    }
}

/// Every `<version>/node_modules` under a version-manager home. The running
/// process has no notion of an "active" version, so all installed versions
/// contribute, sorted for determinism.
fn version_manager_roots(nvm_home: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(nvm_home) else {
        return Vec::new();
    };
    let mut versions: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.path())
        .collect();
    versions.sort();
    versions
        .into_iter()
        .map(|version| version.join("node_modules"))
        .collect()
}

fn has_valid_root_suffix(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| VALID_ROOT_SUFFIXES.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline(cwd: &str, env: EnvSnapshot) -> PathResolver {
        PathResolver::with_env(cwd, env).probe_package_managers(false)
    }

    fn position(paths: &[PathBuf], needle: &str) -> Option<usize> {
        paths.iter().position(|p| p == Path::new(needle))
    }

    #[test]
    fn local_roots_are_deepest_first() {
        let resolver = offline("/home/user/project", EnvSnapshot::default());
        let roots = resolver.local_roots();
        assert_eq!(
            roots,
            vec![
                PathBuf::from("/home/user/project/node_modules"),
                PathBuf::from("/home/user/node_modules"),
                PathBuf::from("/home/node_modules"),
                PathBuf::from("/node_modules"),
            ]
        );
    }

    #[test]
    fn global_roots_prioritize_install_location_over_defaults() {
        let env = EnvSnapshot {
            exe_path: Some(PathBuf::from("/usr/lib/node_modules/genscope/bin/genscope")),
            ..Default::default()
        };
        let roots = offline("/work", env).global_roots(false);
        let two_up = position(&roots, "/usr/lib/node_modules");
        let defaults = position(&roots, "/usr/local/lib/node_modules");
        assert!(two_up.is_some() && defaults.is_some());
        assert!(two_up < defaults);
    }

    #[test]
    fn node_path_entries_come_last_and_survive_filtering() {
        let env = EnvSnapshot {
            node_path: Some("/extra/one:/extra/two".to_string()),
            ..Default::default()
        };
        let roots = offline("/work", env.clone()).global_roots(false);
        let one = position(&roots, "/extra/one");
        let two = position(&roots, "/extra/two");
        assert!(one.is_some() && two.is_some());
        assert!(two < one, "later entries keep lower priority");

        let filtered = offline("/work", env).global_roots(true);
        assert!(position(&filtered, "/extra/one").is_some());
        assert!(position(&filtered, "/extra/two").is_some());
    }

    #[test]
    fn filtering_drops_unrecognized_suffixes() {
        let env = EnvSnapshot {
            exe_path: Some(PathBuf::from("/usr/lib/node_modules/genscope/bin/genscope")),
            ..Default::default()
        };
        let roots = offline("/work", env).global_roots(true);
        // Four levels above the executable directory is /usr, which does not
        // look like a package root.
        assert_eq!(position(&roots, "/usr"), None);
        assert!(position(&roots, "/usr/lib/node_modules").is_some());
    }

    #[test]
    fn version_manager_replaces_platform_defaults() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join("v20.1.0")).unwrap();
        std::fs::create_dir(temp.path().join("v18.2.0")).unwrap();

        let env = EnvSnapshot {
            nvm_home: Some(temp.path().to_path_buf()),
            ..Default::default()
        };
        let roots = offline("/work", env).global_roots(false);
        assert!(roots.contains(&temp.path().join("v18.2.0/node_modules")));
        assert!(roots.contains(&temp.path().join("v20.1.0/node_modules")));
        assert_eq!(position(&roots, "/usr/lib/node_modules"), None);
    }

    #[test]
    fn npm_paths_are_local_first_and_deduplicated() {
        let env = EnvSnapshot {
            node_path: Some("/home/user/project/node_modules".to_string()),
            ..Default::default()
        };
        let resolver = offline("/home/user/project", env);
        let paths = resolver.npm_paths(false, false);
        assert_eq!(paths[0], PathBuf::from("/home/user/project/node_modules"));
        assert_eq!(
            paths
                .iter()
                .filter(|p| **p == PathBuf::from("/home/user/project/node_modules"))
                .count(),
            1
        );

        let local = resolver.npm_paths(true, false);
        assert_eq!(local.len(), resolver.local_roots().len());
    }
}
