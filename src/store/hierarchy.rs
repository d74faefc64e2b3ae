//! Nominal type declarations for the reference host.

use super::types::TypeExpr;
use crate::query::TypeLattice;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single-parent nominal hierarchy rooted at `Any`.
///
/// Types that were never declared are treated as direct children of `Any`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeHierarchy {
    parents: HashMap<String, String>,
}

impl TypeHierarchy {
    pub fn new() -> Self { Self::default() }

    /// Declares `name` as a direct subtype of `supertype` (`None` means `Any`).
    ///
    /// Redeclaring with the same parent is a no-op. A different parent, or a parent
    /// that would close a cycle, is rejected.
    pub fn declare(&mut self, name: &str, supertype: Option<&str>) -> Result<(), String> {
        let parent = match supertype {
            None | Some("Any") => None,
            Some(p) => Some(p),
        };

        if let Some(existing) = self.parents.get(name) {
            return if parent == Some(existing.as_str()) {
                Ok(())
            } else {
                Err(format!("Type '{}' is already declared as a subtype of '{}'", name, existing))
            };
        }

        let Some(parent) = parent else {
            return Ok(());
        };

        if parent == name || self.ancestors(parent).any(|a| a == name) {
            return Err(format!("Declaring '{}' <: '{}' would create a cycle", name, parent));
        }

        self.parents.insert(name.to_string(), parent.to_string());
        Ok(())
    }

    pub fn supertype(&self, name: &str) -> Option<&str> {
        self.parents.get(name).map(String::as_str)
    }

    /// Walks the declared parents of `name`, nearest first. `Any` is implicit and not yielded.
    pub fn ancestors<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let mut current = self.supertype(name);
        std::iter::from_fn(move || {
            let next = current?;
            current = self.supertype(next);
            Some(next)
        })
    }

    fn named_subtype(&self, sub: &str, sup: &str) -> bool {
        sub == sup || self.ancestors(sub).any(|a| a == sup)
    }
}

impl TypeLattice for TypeHierarchy {
    fn is_subtype(&self, sub: &TypeExpr, sup: &TypeExpr) -> bool {
        match (sub, sup) {
            (_, TypeExpr::Any) => true,
            (TypeExpr::Any, _) => false,
            (a, b) if a == b => true,
            (TypeExpr::Named(a), TypeExpr::Named(b)) => self.named_subtype(a, b),
            // Parameters are invariant: Vector{Int} is not a Vector{Number}.
            (
                TypeExpr::Applied { head: h, args: xs },
                TypeExpr::Applied { head: g, args: ys },
            ) => xs == ys && self.named_subtype(h, g),
            (TypeExpr::Applied { head, .. }, TypeExpr::Named(b)) => self.named_subtype(head, b),
            _ => false,
        }
    }
}
