//! A reference implementation of the host registry the validator queries.
pub mod environment;
pub mod hierarchy;
pub mod registry;
pub mod types;

// Re-export key types for convenient access
pub use environment::Environment;
pub use hierarchy::TypeHierarchy;
pub use registry::MethodRegistry;
pub use types::{format_tuple, InterfaceId, Scope, Signature, TypeExpr, TypeParseError};
