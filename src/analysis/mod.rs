//! Whole-registry analysis of declared interfaces.
pub mod topology;

pub use topology::ObligationGraph;
