//! The executor that walks a compiled contract against one candidate type.
use super::context::{Mode, ValidationContext};
use super::error::{ConformanceError, ErrorKind};
use super::rules::{method, nominal, predicate};
use crate::config::CyclePolicy;
use crate::contract::{
    AlternativeReq, ConditionalReq, Contract, MethodReq, Predicate, RequirementNode,
    ReturnObligation,
};
use crate::interfaces::InterfaceRegistry;
use crate::query::Host;
use crate::store::{InterfaceId, TypeExpr};
use tracing::{debug, trace};

/// Runs the requirements of one contract.
///
/// Holds only borrows. Nested interface obligations spawn a fresh validator for the
/// nested contract, sharing the registry and host.
pub struct Validator<'a, H: Host + ?Sized> {
    contract: &'a Contract,
    registry: &'a InterfaceRegistry,
    host: &'a H,
}

/// How a return obligation is enforced once the candidate is known.
enum Obligation {
    Type(TypeExpr),
    Interface(InterfaceId),
}

impl<'a, H: Host + ?Sized> Validator<'a, H> {
    pub fn new(contract: &'a Contract, registry: &'a InterfaceRegistry, host: &'a H) -> Self {
        Self { contract, registry, host }
    }

    /// Checks every top-level requirement in order and stops at the first violation.
    pub fn validate(&self, ctx: &ValidationContext) -> Result<(), ConformanceError> {
        self.check_all(&self.contract.requirements, ctx)
    }

    /// Like [`validate`](Self::validate), but in [`Mode::Probe`] non-fatal violations
    /// come back as `Ok(false)`.
    pub fn run(&self, ctx: &ValidationContext) -> Result<bool, ConformanceError> {
        settle(self.validate(ctx), ctx)
    }

    fn check_all(
        &self,
        nodes: &[RequirementNode],
        ctx: &ValidationContext,
    ) -> Result<(), ConformanceError> {
        for node in nodes {
            self.check_node(node, ctx)?;
        }
        Ok(())
    }

    fn check_node(
        &self,
        node: &RequirementNode,
        ctx: &ValidationContext,
    ) -> Result<(), ConformanceError> {
        match node {
            RequirementNode::Method(req) => self.check_method(req, ctx),
            RequirementNode::Subtype(_) => {
                trace!(
                    interface = %self.contract.identity,
                    candidate = %ctx.candidate(),
                    "checking nominal ancestry"
                );
                nominal::require_ancestry(self.host, &self.contract.identity, ctx.candidate())
            }
            RequirementNode::Conditional(cond) => self.check_conditional(cond, ctx),
            RequirementNode::Alternative(alt) => self.check_alternative(alt, ctx),
            RequirementNode::Sequence(seq) => self.check_all(&seq.children, ctx),
        }
    }

    fn check_method(
        &self,
        req: &MethodReq,
        ctx: &ValidationContext,
    ) -> Result<(), ConformanceError> {
        let interface = &self.contract.identity;
        let args = method::resolve_arguments(req, ctx.candidate());
        trace!(%interface, operation = %req.name, args = ?args, "checking operation");

        method::require_operation(self.host, interface, req, &args, ctx.scopes())?;

        let Some(returns) = &req.returns else {
            return Ok(());
        };
        let inferred = self.host.infer_return_type(&req.name, &args);

        match self.resolve_obligation(returns, ctx.candidate()) {
            Obligation::Type(required) => {
                method::require_return_type(self.host, interface, req, &args, &required, inferred)
            }
            Obligation::Interface(target) => {
                let required = TypeExpr::Named(target.0.clone());
                let Some(returned) = inferred else {
                    return Err(method::invalid_return(interface, req, &args, required, None, None));
                };
                match self.check_interface(&returned, &target, ctx) {
                    Ok(()) => Ok(()),
                    Err(err) if err.is_recursion_guard() => Err(err),
                    Err(err) => Err(method::invalid_return(
                        interface,
                        req,
                        &args,
                        required,
                        Some(returned),
                        Some(err),
                    )),
                }
            }
        }
    }

    /// Named return types that became interfaces after this contract was compiled are
    /// promoted here.
    fn resolve_obligation(&self, returns: &ReturnObligation, candidate: &TypeExpr) -> Obligation {
        match returns {
            ReturnObligation::Interface(id) => Obligation::Interface(id.clone()),
            ReturnObligation::Type(TypeExpr::Named(name))
                if self.registry.is_interface_type(name) =>
            {
                Obligation::Interface(InterfaceId::new(name.as_str()))
            }
            ReturnObligation::Type(ty) => Obligation::Type(ty.substitute(candidate)),
        }
    }

    fn check_conditional(
        &self,
        cond: &ConditionalReq,
        ctx: &ValidationContext,
    ) -> Result<(), ConformanceError> {
        for (index, branch) in cond.branches.iter().enumerate() {
            if self.evaluate(&branch.predicate, ctx)? {
                trace!(
                    interface = %self.contract.identity,
                    branch = index,
                    "conditional branch taken"
                );
                return self.check_all(&branch.body.children, ctx);
            }
        }
        match &cond.else_body {
            Some(body) => self.check_all(&body.children, ctx),
            None => Ok(()),
        }
    }

    fn evaluate(
        &self,
        pred: &Predicate,
        ctx: &ValidationContext,
    ) -> Result<bool, ConformanceError> {
        let mut implements = |ty: &TypeExpr, target: &InterfaceId| {
            match self.check_interface(ty, target, ctx) {
                Ok(()) => Ok(true),
                Err(err)
                    if err.is_recursion_guard() || err.kind() == ErrorKind::UnknownInterface =>
                {
                    Err(err)
                }
                Err(err) => {
                    trace!(%ty, interface = %target, error = %err, "implements term is false");
                    Ok(false)
                }
            }
        };
        predicate::evaluate(pred, ctx.candidate(), self.host, &mut implements)
    }

    fn check_alternative(
        &self,
        alt: &AlternativeReq,
        ctx: &ValidationContext,
    ) -> Result<(), ConformanceError> {
        let probe = ctx.probe();
        let short_circuit = self.registry.config().short_circuit_alternatives;
        let mut satisfied = false;

        for (index, child) in alt.children.iter().enumerate() {
            let passed = settle(self.check_node(child, &probe), &probe)?;
            trace!(
                interface = %self.contract.identity,
                child = index,
                passed,
                "alternative evaluated"
            );
            satisfied |= passed;
            if satisfied && short_circuit {
                break;
            }
        }

        if satisfied {
            Ok(())
        } else {
            Err(ConformanceError::AlternativeUnsatisfied {
                interface: self.contract.identity.clone(),
                candidate: ctx.candidate().clone(),
                group: alt.source.clone(),
            })
        }
    }

    /// Checks `ty` against another registered interface, guarding against re-entry and
    /// runaway nesting.
    fn check_interface(
        &self,
        ty: &TypeExpr,
        target: &InterfaceId,
        ctx: &ValidationContext,
    ) -> Result<(), ConformanceError> {
        let contract = self
            .registry
            .contract(target.as_str())
            .ok_or_else(|| ConformanceError::UnknownInterface { interface: target.clone() })?;

        if ctx.is_active(ty, target) {
            return match self.registry.config().cycle_policy {
                CyclePolicy::Assume => {
                    debug!(%ty, interface = %target, "re-entered obligation assumed satisfied");
                    Ok(())
                }
                CyclePolicy::Reject => {
                    let mut chain = ctx.chain().to_vec();
                    chain.push((ty.clone(), target.clone()));
                    Err(ConformanceError::CyclicObligation { chain })
                }
            };
        }

        let limit = self.registry.config().max_obligation_depth;
        if ctx.depth() >= limit {
            return Err(ConformanceError::ObligationDepthExceeded {
                interface: target.clone(),
                limit,
            });
        }

        trace!(%ty, interface = %target, depth = ctx.depth(), "checking nested obligation");
        let nested = ctx.nested(ty.clone(), target.clone(), &contract.home_scope);
        Validator::new(contract.as_ref(), self.registry, self.host).validate(&nested)
    }
}

fn settle(
    result: Result<(), ConformanceError>,
    ctx: &ValidationContext,
) -> Result<bool, ConformanceError> {
    match result {
        Ok(()) => Ok(true),
        Err(err) if ctx.mode() == Mode::Probe && !err.is_fatal() => Ok(false),
        Err(err) => Err(err),
    }
}
