//! Interface contracts: the requirement AST and the compiler that produces it.
pub mod ast;
pub mod compiler;
pub mod lexer;

pub use ast::{
    AlternativeReq, Branch, ConditionalReq, Contract, MethodReq, ParamConstraint, Predicate,
    RequirementNode, ReturnObligation, SequenceReq, SnapshotError, SubtypeReq,
};
pub use compiler::{is_valid_binding, parse_type, ContractCompiler};
