use super::types::{Scope, Signature, TypeExpr};
use crate::query::TypeLattice;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operation name -> overloads, in registration order.
///
/// Append-only: a newly registered overload is visible to the very next query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodRegistry {
    methods: HashMap<String, Vec<Signature>>,
}

impl MethodRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, name: &str, params: Vec<TypeExpr>, returns: TypeExpr, scope: Scope) {
        self.methods
            .entry(name.to_string())
            .or_default()
            .push(Signature { params, returns, scope });
    }

    pub fn signatures(&self, name: &str) -> &[Signature] {
        self.methods.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether some overload in `scopes` accepts every type in `args`.
    pub fn exists_with<L: TypeLattice + ?Sized>(
        &self,
        lattice: &L,
        name: &str,
        args: &[TypeExpr],
        scopes: &[Scope],
    ) -> bool {
        self.signatures(name)
            .iter()
            .filter(|sig| scopes.contains(&sig.scope))
            .any(|sig| accepts(lattice, sig, args))
    }

    /// The most specific applicable overload across all scopes.
    ///
    /// Ties (neither overload more specific than the other) keep the earliest registration.
    pub fn most_specific<L: TypeLattice + ?Sized>(
        &self,
        lattice: &L,
        name: &str,
        args: &[TypeExpr],
    ) -> Option<&Signature> {
        let mut best: Option<&Signature> = None;
        for sig in self.signatures(name).iter().filter(|sig| accepts(lattice, sig, args)) {
            best = match best {
                Some(current) if !strictly_more_specific(lattice, sig, current) => Some(current),
                _ => Some(sig),
            };
        }
        best
    }
}

fn accepts<L: TypeLattice + ?Sized>(lattice: &L, sig: &Signature, args: &[TypeExpr]) -> bool {
    sig.params.len() == args.len()
        && args.iter().zip(&sig.params).all(|(arg, param)| lattice.is_subtype(arg, param))
}

fn more_specific<L: TypeLattice + ?Sized>(lattice: &L, a: &Signature, b: &Signature) -> bool {
    a.params.iter().zip(&b.params).all(|(pa, pb)| lattice.is_subtype(pa, pb))
}

fn strictly_more_specific<L: TypeLattice + ?Sized>(
    lattice: &L,
    a: &Signature,
    b: &Signature,
) -> bool {
    more_specific(lattice, a, b) && !more_specific(lattice, b, a)
}
