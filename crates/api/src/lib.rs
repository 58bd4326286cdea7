pub mod error;
pub mod meta;
pub mod namespace;

// Re-export commonly used types
pub use error::{GenscopeError, Result};
pub use meta::Meta;
pub use namespace::{Namespace, NamespaceFlag, namespace_to_name};
