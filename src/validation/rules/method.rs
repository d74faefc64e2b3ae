//! Rule for required operations and their return obligations.
use crate::contract::MethodReq;
use crate::query::{MethodQuery, TypeLattice};
use crate::store::{InterfaceId, Scope, TypeExpr};
use crate::validation::error::ConformanceError;

/// The argument tuple to look up: every constraint with the candidate substituted.
pub(crate) fn resolve_arguments(req: &MethodReq, candidate: &TypeExpr) -> Vec<TypeExpr> {
    req.params.iter().map(|p| p.constraint.substitute(candidate)).collect()
}

pub(crate) fn require_operation<Q: MethodQuery + ?Sized>(
    host: &Q,
    interface: &InterfaceId,
    req: &MethodReq,
    args: &[TypeExpr],
    scopes: &[Scope],
) -> Result<(), ConformanceError> {
    if host.exists(&req.name, args, scopes) {
        Ok(())
    } else {
        Err(ConformanceError::MissingOperation {
            interface: interface.clone(),
            operation: req.name.clone(),
            arg_types: args.to_vec(),
            scopes: scopes.to_vec(),
        })
    }
}

/// Ordinary return compatibility: the inferred type must be `required` or a subtype of it.
pub(crate) fn require_return_type<L: TypeLattice + ?Sized>(
    lattice: &L,
    interface: &InterfaceId,
    req: &MethodReq,
    args: &[TypeExpr],
    required: &TypeExpr,
    inferred: Option<TypeExpr>,
) -> Result<(), ConformanceError> {
    match inferred {
        Some(ty) if lattice.is_subtype(&ty, required) => Ok(()),
        inferred => Err(invalid_return(interface, req, args, required.clone(), inferred, None)),
    }
}

pub(crate) fn invalid_return(
    interface: &InterfaceId,
    req: &MethodReq,
    args: &[TypeExpr],
    required: TypeExpr,
    inferred: Option<TypeExpr>,
    source: Option<ConformanceError>,
) -> ConformanceError {
    ConformanceError::InvalidReturnType {
        interface: interface.clone(),
        operation: req.name.clone(),
        arg_types: args.to_vec(),
        required,
        inferred,
        source: source.map(Box::new),
    }
}
