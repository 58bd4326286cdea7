use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Registry entry for a resolved generator.
///
/// Exactly one entry exists per namespace; re-registering the same namespace
/// with a different resolved path replaces the earlier entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Canonical namespace the entry is stored under.
    pub namespace: String,
    /// Absolute path to the generator entry point.
    pub resolved: PathBuf,
    /// Root of the npm package providing the generator, when known.
    pub package_path: Option<PathBuf>,
    /// Directory containing the entry point.
    pub generator_dir: PathBuf,
}

impl Meta {
    pub fn new(namespace: &str, resolved: &Path, package_path: Option<&Path>) -> Self {
        Meta {
            namespace: namespace.to_string(),
            resolved: resolved.to_path_buf(),
            package_path: package_path.map(Path::to_path_buf),
            generator_dir: resolved.parent().unwrap_or(resolved).to_path_buf(),
        }
    }
}
