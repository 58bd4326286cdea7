pub mod environment;
pub mod logging;
pub mod lookup;
pub mod paths;
pub mod resolver;
pub mod store;
pub mod util;

pub use environment::{Environment, EnvironmentOptions};
pub use genscope_api::{GenscopeError, Meta, Namespace, NamespaceFlag, Result, namespace_to_name};
pub use lookup::{PackageLookup, PackageLookupOptions, PackageModule};
pub use paths::{EnvSnapshot, PathResolver};
pub use resolver::{
    DEFAULT_LOOKUPS, DiscoveredGenerator, LookupOptions, NamespaceLookupOptions,
    namespace_from_path,
};
pub use store::Store;
