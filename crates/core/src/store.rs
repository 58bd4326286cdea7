//! In-memory registry of namespaces and the packages providing them.

use genscope_api::Meta;
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Thread-unsafe by design: an `Environment` owns exactly one `Store`, and
/// cross-thread use needs an external mutex around the owning environment.
#[derive(Debug, Default)]
pub struct Store {
    metas: IndexMap<String, Meta>,
    /// Package-namespace → provider roots, most recently registered first.
    packages_paths: IndexMap<String, Vec<PathBuf>>,
    packages_ns: IndexSet<String>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Store a resolved entry under its namespace, replacing any earlier
    /// entry for the same namespace.
    pub fn add(&mut self, namespace: &str, resolved: &Path, package_path: Option<&Path>) {
        self.metas.insert(
            namespace.to_string(),
            Meta::new(namespace, resolved, package_path),
        );
    }

    pub fn get(&self, namespace: &str) -> Option<&Meta> {
        self.metas.get(namespace)
    }

    /// Registered namespaces, in registration order.
    pub fn namespaces(&self) -> Vec<String> {
        self.metas.keys().cloned().collect()
    }

    pub fn metas(&self) -> &IndexMap<String, Meta> {
        &self.metas
    }

    /// Record a provider root for a package namespace. A path already on the
    /// list moves to the front instead of duplicating, so the head is always
    /// the most recent registration.
    pub fn add_package(&mut self, package_ns: &str, package_path: &Path) {
        match self.packages_paths.get_mut(package_ns) {
            Some(paths) => {
                if paths.first().map(PathBuf::as_path) != Some(package_path) {
                    debug!(
                        package_ns,
                        path = %package_path.display(),
                        "overriding package path"
                    );
                    paths.retain(|p| p != package_path);
                    paths.insert(0, package_path.to_path_buf());
                }
            }
            None => {
                self.packages_paths
                    .insert(package_ns.to_string(), vec![package_path.to_path_buf()]);
            }
        }
    }

    pub fn package_paths(&self, package_ns: &str) -> Option<&[PathBuf]> {
        self.packages_paths.get(package_ns).map(Vec::as_slice)
    }

    pub fn add_package_ns(&mut self, package_ns: &str) {
        self.packages_ns.insert(package_ns.to_string());
    }

    pub fn has_package_ns(&self, package_ns: &str) -> bool {
        self.packages_ns.contains(package_ns)
    }

    /// Every package namespace ever registered, in first-seen order.
    pub fn package_namespaces(&self) -> Vec<String> {
        self.packages_ns.iter().cloned().collect()
    }
}
