//! Per-check state handed down the requirement tree.
use crate::store::{InterfaceId, Scope, TypeExpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The first unmet requirement is returned as an error.
    Strict,
    /// Non-fatal violations are folded into `false`. Used for alternative children.
    Probe,
}

/// Created for one check and discarded afterwards.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    candidate: TypeExpr,
    scopes: Vec<Scope>,
    mode: Mode,
    /// `(type, interface)` pairs currently being checked, outermost first.
    chain: Vec<(TypeExpr, InterfaceId)>,
}

impl ValidationContext {
    pub fn new(candidate: TypeExpr, interface: InterfaceId, scopes: Vec<Scope>) -> Self {
        let chain = vec![(candidate.clone(), interface)];
        Self { candidate, scopes, mode: Mode::Strict, chain }
    }

    pub fn candidate(&self) -> &TypeExpr { &self.candidate }
    pub fn scopes(&self) -> &[Scope] { &self.scopes }
    pub fn mode(&self) -> Mode { self.mode }
    pub fn chain(&self) -> &[(TypeExpr, InterfaceId)] { &self.chain }
    pub fn depth(&self) -> usize { self.chain.len() }

    pub fn is_active(&self, ty: &TypeExpr, interface: &InterfaceId) -> bool {
        self.chain.iter().any(|(t, i)| t == ty && i == interface)
    }

    pub(crate) fn probe(&self) -> Self {
        Self { mode: Mode::Probe, ..self.clone() }
    }

    /// Context for checking `candidate` against a nested interface obligation.
    ///
    /// Lookups see the current scopes plus the nested interface's home scope.
    pub(crate) fn nested(&self, candidate: TypeExpr, interface: InterfaceId, home: &Scope) -> Self {
        let mut scopes = self.scopes.clone();
        if !scopes.contains(home) {
            scopes.push(home.clone());
        }
        let mut chain = self.chain.clone();
        chain.push((candidate.clone(), interface));
        Self { candidate, scopes, mode: Mode::Strict, chain }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_extends_chain_and_scopes() {
        let main = vec![Scope::new("Main")];
        let ctx = ValidationContext::new(TypeExpr::named("X"), InterfaceId::new("A"), main);
        let probe = ctx.probe();
        assert_eq!(probe.mode(), Mode::Probe);

        let geometry = Scope::new("Geometry");
        let nested = probe.nested(TypeExpr::named("Y"), InterfaceId::new("B"), &geometry);
        assert_eq!(nested.mode(), Mode::Strict);
        assert_eq!(nested.depth(), 2);
        assert_eq!(nested.scopes(), &[Scope::new("Main"), Scope::new("Geometry")]);
        assert!(nested.is_active(&TypeExpr::named("X"), &InterfaceId::new("A")));
        assert!(!nested.is_active(&TypeExpr::named("X"), &InterfaceId::new("B")));

        let again = nested.nested(TypeExpr::named("Z"), InterfaceId::new("C"), &Scope::new("Main"));
        assert_eq!(again.scopes().len(), 2);
    }
}
