//! The compiled, immutable form of an interface contract.

use super::compiler::is_valid_binding;
use crate::store::{InterfaceId, Scope, TypeExpr};
use crate::validation::ConformanceError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Error returned when a contract snapshot cannot be restored.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid contract snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Malformed(#[from] ConformanceError),
}

type Malformed<'a> = &'a dyn Fn(String) -> ConformanceError;

/// A compiled interface.
///
/// Built exactly once by the `ContractCompiler` and never mutated afterwards. The
/// author's placeholder has already been replaced by `TypeExpr::Candidate` in every
/// node, so evaluation never looks at `source_text` again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub identity: InterfaceId,
    /// The identifier the author used for the candidate type.
    pub placeholder: String,
    /// Default scope for lookups when a query names none.
    pub home_scope: Scope,
    pub requirements: Vec<RequirementNode>,
    pub source_text: String,
}

impl Contract {
    /// Names of every type this contract may recurse into: interface obligations,
    /// plain named return types (which may be declared as interfaces later) and
    /// `implements` predicates.
    pub fn obligation_targets(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for node in &self.requirements {
            node.collect_targets(&mut out);
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Restores a snapshot written by [`to_json`](Self::to_json).
    ///
    /// The snapshot did not pass through the compiler, so its shape is checked again:
    /// valid bindings, no zero-parameter operations, no conditional without branches and
    /// no alternative group with fewer than two choices.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let contract: Self = serde_json::from_str(json)?;
        contract.check_shape()?;
        Ok(contract)
    }

    fn check_shape(&self) -> Result<(), ConformanceError> {
        let malformed = |reason: String| ConformanceError::MalformedContract {
            interface: self.identity.clone(),
            line: 0,
            column: 0,
            reason,
        };
        if !is_valid_binding(self.identity.as_str()) {
            return Err(malformed(format!("`{}` is not a valid interface name", self.identity)));
        }
        if !is_valid_binding(&self.placeholder) || self.placeholder == self.identity.as_str() {
            return Err(malformed(format!(
                "`{}` is not a valid placeholder binding",
                self.placeholder
            )));
        }
        for node in &self.requirements {
            node.check_shape(&malformed)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequirementNode {
    Method(MethodReq),
    Subtype(SubtypeReq),
    Conditional(ConditionalReq),
    Alternative(AlternativeReq),
    Sequence(SequenceReq),
}

impl RequirementNode {
    fn check_shape(&self, malformed: Malformed<'_>) -> Result<(), ConformanceError> {
        match self {
            RequirementNode::Method(m) if m.params.is_empty() => Err(malformed(format!(
                "`{}()` names no parameters; a required operation needs at least one",
                m.name
            ))),
            RequirementNode::Method(_) | RequirementNode::Subtype(_) => Ok(()),
            RequirementNode::Conditional(c) => {
                if c.branches.is_empty() {
                    return Err(malformed("conditional group has no branches".into()));
                }
                for branch in &c.branches {
                    branch.body.check_shape(malformed)?;
                }
                match &c.else_body {
                    Some(body) => body.check_shape(malformed),
                    None => Ok(()),
                }
            }
            RequirementNode::Alternative(a) => {
                if a.children.len() < 2 {
                    return Err(malformed(format!(
                        "alternative group `{}` needs at least two choices",
                        a.source
                    )));
                }
                a.children.iter().try_for_each(|child| child.check_shape(malformed))
            }
            RequirementNode::Sequence(s) => s.check_shape(malformed),
        }
    }

    fn collect_targets<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            RequirementNode::Method(m) => match &m.returns {
                Some(ReturnObligation::Interface(id)) => out.push(id.as_str()),
                Some(ReturnObligation::Type(TypeExpr::Named(name))) => out.push(name),
                _ => {}
            },
            RequirementNode::Subtype(_) => {}
            RequirementNode::Conditional(c) => {
                for branch in &c.branches {
                    branch.predicate.collect_targets(out);
                    branch.body.collect_targets(out);
                }
                if let Some(body) = &c.else_body {
                    body.collect_targets(out);
                }
            }
            RequirementNode::Alternative(a) => {
                for child in &a.children {
                    child.collect_targets(out);
                }
            }
            RequirementNode::Sequence(s) => s.collect_targets(out),
        }
    }
}

/// A required operation, e.g. `iterate(x::T, state)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodReq {
    pub name: String,
    /// Never empty: the compiler rejects zero-parameter requirements.
    pub params: SmallVec<[ParamConstraint; 4]>,
    pub returns: Option<ReturnObligation>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamConstraint {
    pub name: Option<String>,
    /// `TypeExpr::Any` for a bare parameter name.
    pub constraint: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReturnObligation {
    Type(TypeExpr),
    /// Checked by recursive conformance, not nominal subtyping.
    Interface(InterfaceId),
}

/// `<: self`: the candidate must nominally derive from the contract's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtypeReq {
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalReq {
    pub branches: Vec<Branch>,
    pub else_body: Option<SequenceReq>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub predicate: Predicate,
    pub body: SequenceReq,
}

/// `a || b || ...`. Always at least two children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeReq {
    pub children: Vec<RequirementNode>,
    /// The group exactly as authored, used in diagnostics.
    pub source: String,
}

/// Logical AND of its children, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceReq {
    pub children: Vec<RequirementNode>,
}

impl SequenceReq {
    fn check_shape(&self, malformed: Malformed<'_>) -> Result<(), ConformanceError> {
        self.children.iter().try_for_each(|child| child.check_shape(malformed))
    }

    fn collect_targets<'a>(&'a self, out: &mut Vec<&'a str>) {
        for child in &self.children {
            child.collect_targets(out);
        }
    }
}

/// A condition over the candidate, evaluated when a conditional group is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Literal(bool),
    SubtypeOf(TypeExpr, TypeExpr),
    Equals(TypeExpr, TypeExpr),
    Implements(TypeExpr, InterfaceId),
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    fn collect_targets<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Implements(_, id) => out.push(id.as_str()),
            Predicate::Not(inner) => inner.collect_targets(out),
            Predicate::All(ps) | Predicate::Any(ps) => {
                for p in ps {
                    p.collect_targets(out);
                }
            }
            _ => {}
        }
    }
}
