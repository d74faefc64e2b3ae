//! Evaluation of conditional-group predicates with the candidate bound.
use crate::contract::Predicate;
use crate::query::TypeLattice;
use crate::store::{InterfaceId, TypeExpr};
use crate::validation::error::ConformanceError;

/// Evaluates `predicate`. `implements` answers `implements(T, Iface)` terms; it is
/// only called for terms that are actually reached (`&&` and `||` short-circuit).
pub(crate) fn evaluate<L, F>(
    predicate: &Predicate,
    candidate: &TypeExpr,
    lattice: &L,
    implements: &mut F,
) -> Result<bool, ConformanceError>
where
    L: TypeLattice + ?Sized,
    F: FnMut(&TypeExpr, &InterfaceId) -> Result<bool, ConformanceError>,
{
    Ok(match predicate {
        Predicate::Literal(value) => *value,
        Predicate::SubtypeOf(sub, sup) => {
            lattice.is_subtype(&sub.substitute(candidate), &sup.substitute(candidate))
        }
        Predicate::Equals(a, b) => a.substitute(candidate) == b.substitute(candidate),
        Predicate::Implements(ty, interface) => implements(&ty.substitute(candidate), interface)?,
        Predicate::Not(inner) => !evaluate(inner, candidate, lattice, &mut *implements)?,
        Predicate::All(terms) => {
            for term in terms {
                if !evaluate(term, candidate, lattice, &mut *implements)? {
                    return Ok(false);
                }
            }
            true
        }
        Predicate::Any(terms) => {
            for term in terms {
                if evaluate(term, candidate, lattice, &mut *implements)? {
                    return Ok(true);
                }
            }
            false
        }
    })
}
