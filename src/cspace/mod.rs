//! Configuration-space abstraction with adaptive constraint scheduling.
//!
//! A [`CSpace`] holds host callbacks (sampler, metric, interpolation) and a
//! named constraint table. Feasibility of a point is the conjunction of all
//! feasibility predicates; visibility of a segment is decided by the edge
//! planner. Per-constraint cost and pass-rate statistics feed an order
//! optimizer that minimizes expected rejection time.

mod constraint;
mod goal;
mod order;
mod space;
mod stats;

pub use constraint::{ConstraintSet, FeasiblePredicate, TestKind, Truthy, VisiblePredicate};
pub use goal::{GoalSampleFn, GoalSet, GoalTestFn};
pub use order::optimize_testing_order;
pub use space::{CSpace, DistanceFn, InterpolateFn, NeighborhoodSampleFn, SampleFn};
pub use stats::TesterStats;
