//! The reference host: a type hierarchy plus an operation table.

use super::hierarchy::TypeHierarchy;
use super::registry::MethodRegistry;
use super::types::{Scope, TypeExpr};
use crate::query::{MethodQuery, TypeLattice};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    pub types: TypeHierarchy,
    pub methods: MethodRegistry,
}

impl Environment {
    pub fn new() -> Self { Self::default() }

    pub fn declare_type(&mut self, name: &str, supertype: Option<&str>) -> Result<(), String> {
        self.types.declare(name, supertype)
    }

    pub fn define_method(
        &mut self,
        scope: &Scope,
        name: &str,
        params: Vec<TypeExpr>,
        returns: TypeExpr,
    ) {
        self.methods.register(name, params, returns, scope.clone());
    }
}

impl TypeLattice for Environment {
    fn is_subtype(&self, sub: &TypeExpr, sup: &TypeExpr) -> bool {
        self.types.is_subtype(sub, sup)
    }
}

impl MethodQuery for Environment {
    fn exists(&self, operation: &str, arg_types: &[TypeExpr], scopes: &[Scope]) -> bool {
        self.methods.exists_with(&self.types, operation, arg_types, scopes)
    }

    fn infer_return_type(&self, operation: &str, arg_types: &[TypeExpr]) -> Option<TypeExpr> {
        self.methods
            .most_specific(&self.types, operation, arg_types)
            .map(|sig| sig.returns.clone())
    }
}
