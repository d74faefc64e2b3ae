//! Defines the error types for the conformance engine.
use crate::store::{format_tuple, InterfaceId, Scope, TypeExpr};
use thiserror::Error;

/// The category of a conformance error, for matching without destructuring payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedContract,
    MissingOperation,
    InvalidReturnType,
    SubtypingRequired,
    AlternativeUnsatisfied,
    UnknownInterface,
    DuplicateInterface,
    CyclicObligation,
    ObligationDepthExceeded,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConformanceError {
    /// The requirement block could not be compiled. Raised at declaration time only.
    #[error("Malformed contract '{interface}' at {line}:{column}: {reason}")]
    MalformedContract { interface: InterfaceId, line: u32, column: u32, reason: String },

    #[error(
        "'{interface}' requires `{operation}{}`, but no such operation is visible in scopes {}",
        format_tuple(.arg_types),
        format_scopes(.scopes)
    )]
    MissingOperation {
        interface: InterfaceId,
        operation: String,
        arg_types: Vec<TypeExpr>,
        scopes: Vec<Scope>,
    },

    #[error(
        "'{interface}' requires `{operation}{}` to return {required}, but it returns {}",
        format_tuple(.arg_types),
        format_inferred(.inferred)
    )]
    InvalidReturnType {
        interface: InterfaceId,
        operation: String,
        arg_types: Vec<TypeExpr>,
        required: TypeExpr,
        inferred: Option<TypeExpr>,
        /// Set when `required` is an interface and the nested check failed.
        #[source]
        source: Option<Box<ConformanceError>>,
    },

    #[error("'{interface}' requires {candidate} to be declared as a subtype of '{interface}'")]
    SubtypingRequired { interface: InterfaceId, candidate: TypeExpr },

    #[error("{candidate} satisfies none of the alternatives of '{interface}': `{group}`")]
    AlternativeUnsatisfied { interface: InterfaceId, candidate: TypeExpr, group: String },

    #[error("'{interface}' is not a declared interface")]
    UnknownInterface { interface: InterfaceId },

    #[error("Interface '{interface}' is already declared")]
    DuplicateInterface { interface: InterfaceId },

    #[error("Cyclic interface obligation: {}", format_chain(.chain))]
    CyclicObligation { chain: Vec<(TypeExpr, InterfaceId)> },

    #[error("Checking '{interface}' exceeded the obligation depth limit of {limit}")]
    ObligationDepthExceeded { interface: InterfaceId, limit: usize },
}

impl ConformanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedContract { .. } => ErrorKind::MalformedContract,
            Self::MissingOperation { .. } => ErrorKind::MissingOperation,
            Self::InvalidReturnType { .. } => ErrorKind::InvalidReturnType,
            Self::SubtypingRequired { .. } => ErrorKind::SubtypingRequired,
            Self::AlternativeUnsatisfied { .. } => ErrorKind::AlternativeUnsatisfied,
            Self::UnknownInterface { .. } => ErrorKind::UnknownInterface,
            Self::DuplicateInterface { .. } => ErrorKind::DuplicateInterface,
            Self::CyclicObligation { .. } => ErrorKind::CyclicObligation,
            Self::ObligationDepthExceeded { .. } => ErrorKind::ObligationDepthExceeded,
        }
    }

    /// Fatal violations escape probe mode and alternative groups.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SubtypingRequired { .. }
                | Self::CyclicObligation { .. }
                | Self::ObligationDepthExceeded { .. }
        )
    }

    /// Errors that describe the obligation chain itself and pass through nested checks unwrapped.
    pub(crate) fn is_recursion_guard(&self) -> bool {
        matches!(self, Self::CyclicObligation { .. } | Self::ObligationDepthExceeded { .. })
    }
}

fn format_scopes(scopes: &[Scope]) -> String {
    let names: Vec<&str> = scopes.iter().map(|s| s.0.as_str()).collect();
    format!("[{}]", names.join(", "))
}

fn format_inferred(inferred: &Option<TypeExpr>) -> String {
    inferred
        .as_ref()
        .map_or_else(|| "an uninferable type".to_string(), |t| t.to_string())
}

fn format_chain(chain: &[(TypeExpr, InterfaceId)]) -> String {
    chain
        .iter()
        .map(|(ty, iface)| format!("{} : {}", ty, iface))
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_operation_message_names_operation_and_types() {
        let err = ConformanceError::MissingOperation {
            interface: InterfaceId::new("Sized"),
            operation: "op".into(),
            arg_types: vec![TypeExpr::named("Int")],
            scopes: vec![Scope::new("Main")],
        };
        assert_eq!(
            err.to_string(),
            "'Sized' requires `op(Int)`, but no such operation is visible in scopes [Main]"
        );
        assert_eq!(err.kind(), ErrorKind::MissingOperation);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_invalid_return_without_inference() {
        let err = ConformanceError::InvalidReturnType {
            interface: InterfaceId::new("Measured"),
            operation: "len".into(),
            arg_types: vec![TypeExpr::named("Rope")],
            required: TypeExpr::named("Int"),
            inferred: None,
            source: None,
        };
        assert!(err.to_string().ends_with("but it returns an uninferable type"));
    }

    #[test]
    fn test_fatal_kinds() {
        let subtype = ConformanceError::SubtypingRequired {
            interface: InterfaceId::new("Shape"),
            candidate: TypeExpr::named("Circle"),
        };
        let cycle = ConformanceError::CyclicObligation {
            chain: vec![
                (TypeExpr::named("X"), InterfaceId::new("A")),
                (TypeExpr::named("Y"), InterfaceId::new("B")),
                (TypeExpr::named("X"), InterfaceId::new("A")),
            ],
        };
        assert!(subtype.is_fatal());
        assert!(cycle.is_fatal());
        assert!(!subtype.is_recursion_guard());
        assert_eq!(
            cycle.to_string(),
            "Cyclic interface obligation: X : A -> Y : B -> X : A"
        );
    }
}
