//! Rule for `<: self`: nominal ancestry, which no set of operations can stand in for.
use crate::query::TypeLattice;
use crate::store::{InterfaceId, TypeExpr};
use crate::validation::error::ConformanceError;

pub(crate) fn require_ancestry<L: TypeLattice + ?Sized>(
    lattice: &L,
    interface: &InterfaceId,
    candidate: &TypeExpr,
) -> Result<(), ConformanceError> {
    let target = TypeExpr::Named(interface.0.clone());
    if lattice.is_subtype(candidate, &target) {
        Ok(())
    } else {
        Err(ConformanceError::SubtypingRequired {
            interface: interface.clone(),
            candidate: candidate.clone(),
        })
    }
}
