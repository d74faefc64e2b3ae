//! Declaring interfaces and querying conformance against them.
pub mod global;
pub mod registry;

pub use global::{
    assert_implements, define_interface, global, implements, init_global, is_interface_type,
};
pub use registry::InterfaceRegistry;
