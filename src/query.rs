//! The boundary between the conformance engine and the host's reflective type system.
//!
//! The validator never owns operations or type declarations. It asks these traits.
//! Implementations must answer from `&self` without observable side effects: the
//! validator is free to ask the same question more than once, or not at all.

use crate::store::{Scope, TypeExpr};

/// Nominal subtyping as declared by the host.
pub trait TypeLattice {
    /// `true` when `sub` is `sup` or declared to derive from it.
    fn is_subtype(&self, sub: &TypeExpr, sup: &TypeExpr) -> bool;
}

/// Lookup of registered operations.
pub trait MethodQuery {
    /// Whether an operation named `operation`, visible in one of `scopes`, accepts an
    /// argument tuple at least as general as `arg_types`.
    fn exists(&self, operation: &str, arg_types: &[TypeExpr], scopes: &[Scope]) -> bool;

    /// The return type of calling `operation` with `arg_types`, or `None` when the host
    /// cannot infer one.
    fn infer_return_type(&self, operation: &str, arg_types: &[TypeExpr]) -> Option<TypeExpr>;
}

/// Everything the validator needs from the host.
pub trait Host: MethodQuery + TypeLattice {}

impl<T: MethodQuery + TypeLattice + ?Sized> Host for T {}
