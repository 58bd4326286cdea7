//! The environment façade: registry plus discovery behind a namespace-based
//! `get`/`register`/`lookup` API.

use crate::lookup::PackageLookup;
use crate::paths::PathResolver;
use crate::resolver::{AliasRule, DEFAULT_LOOKUPS, namespace_from_path};
use crate::store::Store;
use crate::util::{normalize_path, untildify};
use genscope_api::{GenscopeError, Meta, Result, namespace_to_name};
use indexmap::{IndexMap, IndexSet};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

#[derive(Debug, Clone, Default)]
pub struct EnvironmentOptions {
    /// Working directory the local search roots are derived from.
    pub cwd: Option<PathBuf>,
}

/// Owns the generator registry and the machinery that fills it.
///
/// All operations are synchronous; sharing one environment across threads
/// needs an external mutex around it.
pub struct Environment {
    cwd: PathBuf,
    store: Store,
    package_lookup: PackageLookup,
    pub(crate) lookups: Vec<String>,
    pub(crate) aliases: Vec<AliasRule>,
}

impl Environment {
    pub fn new(options: EnvironmentOptions) -> Self {
        let cwd = options
            .cwd
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let mut env = Environment {
            package_lookup: PackageLookup::new(PathResolver::new(cwd.clone())),
            cwd,
            store: Store::new(),
            lookups: DEFAULT_LOOKUPS.iter().map(|s| s.to_string()).collect(),
            aliases: Vec::new(),
        };
        // A bare package name defaults to its `app` generator.
        let _ = env.alias(r"^([^:]+)$", "$1:app");
        env
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn lookups(&self) -> &[String] {
        &self.lookups
    }

    pub(crate) fn package_lookup(&self) -> &PackageLookup {
        &self.package_lookup
    }

    pub fn path_resolver(&self) -> &PathResolver {
        self.package_lookup.path_resolver()
    }

    /// Ordered search roots, local first.
    pub fn npm_paths(&self, local_only: bool) -> Vec<PathBuf> {
        self.path_resolver().npm_paths(local_only, false)
    }

    /// Register a generator entry under `namespace`, deriving one from the
    /// path when none is given. Registering an identical (namespace, path)
    /// pair again is a no-op; a different path overwrites.
    pub fn register<P: AsRef<Path>>(
        &mut self,
        path: P,
        namespace: Option<&str>,
        package_path: Option<&Path>,
    ) -> Result<&mut Self> {
        let module_path = self.resolve_module_path(path.as_ref());
        let module_str = module_path.to_string_lossy().into_owned();
        let namespace = match namespace {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => {
                let derived = namespace_from_path(&module_str, &self.lookups)?;
                if derived.is_empty() {
                    return Err(GenscopeError::UnresolvedNamespace(module_str));
                }
                derived
            }
        };

        if let Some(meta) = self.store.get(&namespace) {
            if meta.resolved == module_path {
                return Ok(self);
            }
        }

        self.store.add(&namespace, &module_path, package_path);
        let package_ns = namespace_to_name(&namespace).to_string();
        self.store.add_package_ns(&package_ns);
        if let Some(package_path) = package_path {
            self.store.add_package(&package_ns, package_path);
        }
        debug!(
            namespace = %namespace,
            path = %module_path.display(),
            package = %package_ns,
            "registered generator"
        );
        Ok(self)
    }

    /// Fetch the entry registered under a namespace, following the alias
    /// chain, or — when the input is actually a filesystem path — register
    /// it on the fly. "Not found" is `None`, never an error.
    pub fn get(&mut self, namespace_or_path: &str) -> Option<Meta> {
        if namespace_or_path.is_empty() {
            return None;
        }

        // Older callers appended a filesystem path to the namespace; strip
        // that trailing segment (and a bare drive letter) before lookup.
        let mut namespace = namespace_or_path.to_string();
        let mut parts: Vec<&str> = namespace_or_path.split(':').collect();
        if parts.len() > 1 {
            let maybe_path = parts[parts.len() - 1];
            if maybe_path.contains('/') || maybe_path.contains('\\') {
                parts.pop();
                if maybe_path.contains('\\') && parts.last().is_some_and(|p| p.len() == 1) {
                    parts.pop();
                }
                namespace = parts.join(":");
            }
        }

        if let Some(meta) = self.store.get(&namespace) {
            return Some(meta.clone());
        }
        let aliased = self.resolve_alias(&namespace).unwrap_or_else(|err| {
            error!(%err, "alias resolution failed");
            namespace.clone()
        });
        if let Some(meta) = self.store.get(&aliased) {
            return Some(meta.clone());
        }
        // The original input, not the stripped namespace: a windows absolute
        // path like `C:\generators\x` strips down to an empty namespace.
        self.get_by_path(namespace_or_path)
    }

    fn get_by_path(&mut self, path: &str) -> Option<Meta> {
        if !Path::new(path).exists() {
            return None;
        }
        let namespace = self.namespace(path).ok()?;
        self.register(path, Some(&namespace), None).ok()?;
        self.get(&namespace)
    }

    /// Derive a namespace from a path using this environment's lookup dirs.
    pub fn namespace(&self, filepath: &str) -> Result<String> {
        namespace_from_path(filepath, &self.lookups)
    }

    /// Registered namespaces, in registration order.
    pub fn namespaces(&self) -> Vec<String> {
        self.store.namespaces()
    }

    /// All registered entries, keyed by namespace.
    pub fn generators(&self) -> &IndexMap<String, Meta> {
        self.store.metas()
    }

    /// Unique package-level names of everything registered.
    pub fn generator_names(&self) -> Vec<String> {
        let names: IndexSet<String> = self
            .store
            .metas()
            .keys()
            .map(|ns| namespace_to_name(ns).to_string())
            .collect();
        names.into_iter().collect()
    }

    /// Whether any generator of the given package has been registered.
    pub fn is_package_registered(&self, package_ns: &str) -> bool {
        self.store.has_package_ns(package_ns)
    }

    /// Every package namespace ever registered.
    pub fn registered_packages(&self) -> Vec<String> {
        self.store.package_namespaces()
    }

    /// Most recently registered provider path for a namespace. A namespace
    /// with a generator segment is answered from its own entry.
    pub fn get_package_path(&mut self, namespace: &str) -> Option<PathBuf> {
        if namespace.contains(':') {
            return self.get(namespace).and_then(|meta| meta.package_path);
        }
        self.get_package_paths(namespace)
            .and_then(|paths| paths.first().cloned())
    }

    /// All provider paths for a package namespace, most recent first,
    /// falling back through the alias chain.
    pub fn get_package_paths(&self, namespace: &str) -> Option<Vec<PathBuf>> {
        if let Some(paths) = self.store.package_paths(namespace) {
            return Some(paths.to_vec());
        }
        let aliased = self.resolve_alias(namespace).unwrap_or_else(|err| {
            error!(%err, "alias resolution failed");
            namespace.to_string()
        });
        self.store
            .package_paths(namespace_to_name(&aliased))
            .map(|paths| paths.to_vec())
    }

    /// Expand a leading `.` against the working directory and a leading `~`
    /// against the home directory, then normalize lexically.
    pub fn resolve_module_path(&self, path: &Path) -> PathBuf {
        let raw = path.to_string_lossy();
        let expanded = if raw.starts_with('.') {
            self.cwd.join(path)
        } else {
            untildify(&raw)
        };
        normalize_path(&expanded)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new(EnvironmentOptions::default())
    }
}
