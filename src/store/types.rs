use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// A type as seen by the conformance engine.
///
/// `Candidate` is the canonical symbol for "the type under test". The contract
/// compiler rewrites every occurrence of an author's placeholder into it, and the
/// validator substitutes the concrete candidate before talking to the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// The top type. Every type is a subtype of `Any`.
    Any,
    Candidate,
    Named(String),
    /// A parameterised type such as `Vector{Int}`.
    Applied { head: String, args: Vec<TypeExpr> },
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn applied(head: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        Self::Applied { head: head.into(), args }
    }

    /// Replaces every `Candidate` with `candidate`.
    pub fn substitute(&self, candidate: &TypeExpr) -> TypeExpr {
        match self {
            TypeExpr::Candidate => candidate.clone(),
            TypeExpr::Applied { head, args } => TypeExpr::Applied {
                head: head.clone(),
                args: args.iter().map(|a| a.substitute(candidate)).collect(),
            },
            other => other.clone(),
        }
    }

}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Any => f.write_str("Any"),
            TypeExpr::Candidate => f.write_str("<candidate>"),
            TypeExpr::Named(name) => f.write_str(name),
            TypeExpr::Applied { head, args } => {
                write!(f, "{}{{", head)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Error returned when a standalone type string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type expression '{input}': {reason}")]
pub struct TypeParseError {
    pub input: String,
    pub reason: String,
}

impl FromStr for TypeExpr {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::contract::parse_type(s)
    }
}

/// Identity of a declared interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceId(pub String);

impl InterfaceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for InterfaceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A visibility boundary for registered operations (e.g. the module that owns them).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope(pub String);

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registered overload of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<TypeExpr>,
    pub returns: TypeExpr,
    pub scope: Scope,
}

/// Renders an argument tuple as `(A, B, C)`.
pub fn format_tuple(types: &[TypeExpr]) -> String {
    let inner: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    format!("({})", inner.join(", "))
}
