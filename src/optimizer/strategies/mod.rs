//! Dispatch strategies
//!
//! - MILP: mixed-integer linear programming over the full day (exact solution)

pub mod milp;

pub use milp::*;
