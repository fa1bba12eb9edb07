// crates/hearth-layout/src/lib.rs

pub mod anchors;
pub mod graph;
pub mod linear;
pub mod session;
pub mod simplex;
pub mod solver;

pub use graph::ConstraintGraph;
pub use session::*;
pub use solver::*;
