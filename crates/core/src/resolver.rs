//! Namespace derivation, bulk discovery, and alias resolution.
//!
//! This module carries the resolver half of [`Environment`]: deriving a
//! namespace from an entry-point path, walking search roots to register
//! everything found, the registry-free single-namespace lookup, and the
//! alias rewrite chain consulted by `get`.

use crate::environment::Environment;
use crate::lookup::{PackageLookup, PackageLookupOptions};
use crate::paths::PathResolver;
use genscope_api::{GenscopeError, Namespace, Result, namespace_to_name};
use regex::Regex;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Directories inside a package that may hold generators. `.` covers
/// packages whose generators sit at the package root.
pub const DEFAULT_LOOKUPS: &[&str] = &[".", "generators", "lib/generators"];

/// Entry manifest matched one level inside each lookup directory.
const ENTRY_FILE_PATTERN: &str = "*/generator.toml";

/// Default filenames dropped from the tail of a derived namespace.
const STRIP_BASENAMES: &[&str] = &["generator", "index", "main"];

/// One pattern → replacement rewrite applied before registry lookups.
#[derive(Debug, Clone)]
pub struct AliasRule {
    pattern: Regex,
    value: String,
}

/// A generator found during a bulk [`Environment::lookup`] pass.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredGenerator {
    pub entry_path: PathBuf,
    pub package_path: PathBuf,
    pub namespace: String,
    pub registered: bool,
}

/// Options for [`Environment::lookup`].
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Skip globally-installed packages.
    pub local_only: bool,
    /// Override the environment's lookup directories.
    pub lookups: Option<Vec<String>>,
    /// Explicit package directories; root discovery is skipped when set.
    pub package_paths: Vec<PathBuf>,
    /// Explicit search roots.
    pub npm_paths: Vec<PathBuf>,
    pub file_patterns: Option<Vec<String>>,
    pub package_patterns: Option<Vec<String>>,
    /// Defaults to `!single_result`: when collecting everything, low-priority
    /// sources register first so high-priority ones override them.
    pub reverse: Option<bool>,
    pub max_depth: Option<usize>,
    /// Stop at the first successfully registered generator.
    pub single_result: bool,
    pub filter_paths: bool,
}

/// Options for the registry-free [`Environment::lookup_namespace`].
#[derive(Debug, Clone)]
pub struct NamespaceLookupOptions {
    pub local_only: bool,
    /// Return the providing package root instead of the entry file.
    pub package_path: bool,
    /// Return the directory two levels above the entry file.
    pub generator_path: bool,
    /// Stop at the first match.
    pub single_result: bool,
    pub npm_paths: Vec<PathBuf>,
    pub package_patterns: Option<Vec<String>>,
    pub file_patterns: Option<Vec<String>>,
    pub cwd: Option<PathBuf>,
}

impl Default for NamespaceLookupOptions {
    fn default() -> Self {
        NamespaceLookupOptions {
            local_only: false,
            package_path: false,
            generator_path: false,
            single_result: true,
            npm_paths: Vec::new(),
            package_patterns: None,
            file_patterns: None,
            cwd: None,
        }
    }
}

/// Derive a namespace from an entry-point path.
///
/// The extension is dropped, lookup directories (and `..`) are removed
/// wherever they appear as whole components, everything through the last
/// `gen-` hint is stripped, a trailing default filename is dropped, and the
/// remaining separators become `:`. An `@scope` component is carried over as
/// a `scope/` prefix.
///
/// ```
/// use genscope_core::resolver::namespace_from_path;
///
/// assert_eq!(
///     namespace_from_path("gen-backbone/all.js", &[]).unwrap(),
///     "backbone:all"
/// );
/// assert_eq!(
///     namespace_from_path("@scope/gen-mocha/model/index.js", &[]).unwrap(),
///     "@scope/mocha:model"
/// );
/// ```
pub fn namespace_from_path(filepath: &str, lookups: &[String]) -> Result<String> {
    if filepath.is_empty() {
        return Err(GenscopeError::MissingNamespace);
    }

    // Work on forward slashes regardless of the platform the path came from.
    let mut ns = filepath.replace('\\', "/");
    if let Some(ext) = Path::new(&ns).extension().and_then(|e| e.to_str()) {
        ns.truncate(ns.len() - ext.len() - 1);
    }
    ns = normalize_slash_path(&ns);

    // Longer lookup dirs are stripped first so `lib/generators` wins over
    // `generators`; every occurrence is removed, not just the first.
    let mut ns_lookups: Vec<String> = lookups
        .iter()
        .map(|lookup| normalize_slash_path(&lookup.replace('\\', "/")))
        .collect();
    ns_lookups.push("..".to_string());
    ns_lookups.sort_by_key(|lookup| std::cmp::Reverse(lookup.len()));
    for lookup in &ns_lookups {
        ns = strip_lookup_component(&ns, lookup);
    }

    let scope = ns
        .split('/')
        .rev()
        .find(|part| part.starts_with('@'))
        .map(str::to_string);
    if let Some(scope) = &scope {
        ns = ns
            .split('/')
            .filter(|part| *part != scope.as_str())
            .collect::<Vec<_>>()
            .join("/");
    }

    if let Some(idx) = ns.rfind("gen-") {
        ns = ns[idx + "gen-".len()..].to_string();
    }
    for base in STRIP_BASENAMES {
        if let Some(stripped) = ns
            .strip_suffix(base)
            .and_then(|rest| rest.strip_suffix('/'))
        {
            ns = stripped.to_string();
            break;
        }
    }

    let ns = ns
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(":");
    let ns = match &scope {
        Some(scope) => format!("{scope}/{ns}"),
        None => ns,
    };
    debug!(filepath, namespace = %ns, "resolved namespace from path");
    Ok(ns)
}

/// Lexically normalize a `/`-separated path string, keeping leading `..`
/// components.
fn normalize_slash_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&prev) if prev != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            part => parts.push(part),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Remove every occurrence of `lookup` that spans whole path components,
/// together with one adjacent separator.
fn strip_lookup_component(ns: &str, lookup: &str) -> String {
    if lookup.is_empty() {
        return ns.to_string();
    }
    let mut ns = ns.to_string();
    let mut search = 0;
    while let Some(found) = ns[search..].find(lookup) {
        let start = search + found;
        let end = start + lookup.len();
        let starts_component = start == 0 || ns.as_bytes()[start - 1] == b'/';
        let ends_component = ns.as_bytes().get(end) == Some(&b'/');
        if starts_component && ends_component {
            if start > 0 {
                ns.replace_range(start - 1..end, "");
                search = start - 1;
            } else {
                ns.replace_range(start..end + 1, "");
            }
        } else {
            search = start + 1;
        }
    }
    ns
}

fn default_file_patterns(lookups: &[String]) -> Vec<String> {
    lookups
        .iter()
        .map(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            if prefix == "." || prefix.is_empty() {
                ENTRY_FILE_PATTERN.to_string()
            } else {
                format!("{prefix}/{ENTRY_FILE_PATTERN}")
            }
        })
        .collect()
}

fn generator_hint_for(name: &str) -> String {
    Namespace::parse(name)
        .map(|ns| ns.generator_hint())
        .unwrap_or_else(|| format!("gen-{name}"))
}

impl Environment {
    /// Search every configured root for generator packages and register all
    /// entry points found. Failures are per-entry: an unreadable package or
    /// a failed registration is reported and skipped, and everything else is
    /// still returned.
    pub fn lookup(&mut self, options: &LookupOptions) -> Vec<DiscoveredGenerator> {
        let lookups = options
            .lookups
            .clone()
            .unwrap_or_else(|| self.lookups.clone());
        let opts = PackageLookupOptions {
            local_only: options.local_only,
            package_paths: options.package_paths.clone(),
            npm_paths: options.npm_paths.clone(),
            file_patterns: options
                .file_patterns
                .clone()
                .unwrap_or_else(|| default_file_patterns(&lookups)),
            package_patterns: options
                .package_patterns
                .clone()
                .unwrap_or_else(|| vec!["gen-*".to_string()]),
            reverse: options.reverse.unwrap_or(!options.single_result),
            max_depth: options.max_depth,
            filter_paths: options.filter_paths,
        };

        let engine = self.package_lookup().clone();
        let single_result = options.single_result;
        let mut discovered = Vec::new();
        let result = engine.sync(&opts, |module| {
            let entry_path = module.file_path.clone();
            let package_path = module.package_path.clone();

            // Namespaces are relative to the package's parent; scoped
            // packages sit one extra level down.
            let mut repository_path = package_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| package_path.clone());
            if repository_path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('@'))
            {
                repository_path.pop();
            }
            let relative = entry_path
                .strip_prefix(&repository_path)
                .unwrap_or(entry_path.as_path());

            let namespace = match namespace_from_path(&relative.to_string_lossy(), &lookups) {
                Ok(namespace) => namespace,
                Err(err) => {
                    warn!(path = %entry_path.display(), %err, "skipping entry without a namespace");
                    return false;
                }
            };
            let registered =
                self.try_registering(&entry_path, Some(&package_path), Some(&namespace));
            discovered.push(DiscoveredGenerator {
                entry_path,
                package_path,
                namespace,
                registered,
            });
            single_result && registered
        });
        if let Err(err) = result {
            warn!(%err, "package lookup failed");
        }
        discovered
    }

    /// Registry-free search for a single namespace: packages matching the
    /// namespace's generator hint are scanned and entry files whose derived
    /// namespace matches are collected. Nothing is registered.
    pub fn lookup_namespace(namespace: &str, options: &NamespaceLookupOptions) -> Vec<PathBuf> {
        let name = namespace_to_name(namespace);
        let package_patterns = options
            .package_patterns
            .clone()
            .unwrap_or_else(|| vec![generator_hint_for(name)]);
        let default_lookups: Vec<String> =
            DEFAULT_LOOKUPS.iter().map(|s| s.to_string()).collect();
        let file_patterns = options
            .file_patterns
            .clone()
            .unwrap_or_else(|| default_file_patterns(&default_lookups));
        let cwd = options
            .cwd
            .clone()
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let engine = PackageLookup::new(PathResolver::new(cwd));
        let mut npm_paths = if options.npm_paths.is_empty() {
            engine.path_resolver().npm_paths(options.local_only, false)
        } else {
            options.npm_paths.clone()
        };
        npm_paths.reverse();

        let package_paths = match engine.find_packages_in(&npm_paths, &package_patterns) {
            Ok(paths) => paths,
            Err(err) => {
                warn!(%err, "package discovery failed");
                return Vec::new();
            }
        };
        let opts = PackageLookupOptions {
            package_paths,
            file_patterns,
            ..Default::default()
        };

        let mut found = Vec::new();
        let result = engine.sync(&opts, |module| {
            let Ok(file_ns) =
                namespace_from_path(&module.file_path.to_string_lossy(), &default_lookups)
            else {
                return false;
            };
            let package_match =
                options.package_path && namespace == namespace_to_name(&file_ns);
            if file_ns != namespace && !package_match {
                return false;
            }
            let path = if options.package_path {
                module.package_path.clone()
            } else if options.generator_path {
                module
                    .file_path
                    .parent()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| module.file_path.clone())
            } else {
                module.file_path.clone()
            };
            found.push(path);
            options.single_result
        });
        if let Err(err) = result {
            warn!(%err, "package lookup failed");
        }
        found
    }

    /// First match of [`Environment::lookup_namespace`] with default options.
    pub fn find_generator(namespace: &str) -> Option<PathBuf> {
        Environment::lookup_namespace(namespace, &NamespaceLookupOptions::default())
            .into_iter()
            .next()
    }

    /// Canonicalize and register one entry, reporting failure instead of
    /// propagating it.
    pub(crate) fn try_registering(
        &mut self,
        reference: &Path,
        package_path: Option<&Path>,
        namespace: Option<&str>,
    ) -> bool {
        let real_path = match fs::canonicalize(reference) {
            Ok(path) => path,
            Err(err) => {
                error!(path = %reference.display(), %err, "unable to resolve generator entry");
                return false;
            }
        };
        debug!(path = %reference.display(), "found generator, trying to register");

        // A symlinked entry keeps the namespace of its install location.
        let derived;
        let namespace = if namespace.is_none() && real_path != reference {
            match self.namespace(&reference.to_string_lossy()) {
                Ok(ns) => {
                    derived = ns;
                    Some(derived.as_str())
                }
                Err(_) => None,
            }
        } else {
            namespace
        };

        match self.register(&real_path, namespace, package_path) {
            Ok(_) => true,
            Err(err) => {
                error!(path = %reference.display(), %err, "unable to register generator");
                false
            }
        }
    }

    /// Register an alias rule. String patterns without explicit anchors are
    /// matched against the entire candidate.
    pub fn alias(&mut self, pattern: &str, value: &str) -> Result<&mut Self> {
        let anchored = if pattern.starts_with('^') || pattern.ends_with('$') {
            pattern.to_string()
        } else {
            format!("^{pattern}$")
        };
        let pattern = Regex::new(&anchored)
            .map_err(|err| GenscopeError::AliasPattern(err.to_string()))?;
        self.aliases.push(AliasRule {
            pattern,
            value: value.to_string(),
        });
        Ok(self)
    }

    /// Apply the alias chain, most recently added rule first, repeating
    /// passes until nothing rewrites. A chain that keeps rewriting past
    /// `rules + 1` passes is a configuration error.
    pub fn resolve_alias(&self, namespace: &str) -> Result<String> {
        let mut current = namespace.to_string();
        for _ in 0..=self.aliases.len() {
            let mut next = current.clone();
            for rule in self.aliases.iter().rev() {
                if rule.pattern.is_match(&next) {
                    next = rule
                        .pattern
                        .replace(&next, rule.value.as_str())
                        .into_owned();
                }
            }
            if next == current {
                return Ok(current);
            }
            current = next;
        }
        Err(GenscopeError::AliasLoop(namespace.to_string()))
    }
}
