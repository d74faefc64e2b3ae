//! Conformance checking of a candidate type against compiled contracts.
//!
//! The [`Validator`] walks a contract's requirement tree node by node, asking the
//! host whether each required operation exists and what it returns.

pub use self::context::{Mode, ValidationContext};
pub use self::error::{ConformanceError, ErrorKind};
pub use self::validator::Validator;

mod context;
mod error;
mod validator;
mod rules {
    pub mod method;
    pub mod nominal;
    pub mod predicate;
}
