// Library facade: structural interface conformance for a nominal, dynamically
// dispatched type system. Interfaces are declared as requirement blocks, compiled
// once into immutable contracts, and checked on demand against candidate types by
// querying a host's method table and type lattice.

pub mod analysis;
pub mod config;
pub mod contract;
pub mod interfaces;
pub mod query;
pub mod store;
pub mod validation;

pub use config::{ConfigError, ConformanceConfig, CyclePolicy};
pub use contract::{Contract, ContractCompiler, RequirementNode, SnapshotError};
pub use interfaces::{
    assert_implements, define_interface, implements, init_global, is_interface_type,
    InterfaceRegistry,
};
pub use query::{Host, MethodQuery, TypeLattice};
pub use store::{Environment, InterfaceId, Scope, TypeExpr};
pub use validation::{ConformanceError, ErrorKind};
