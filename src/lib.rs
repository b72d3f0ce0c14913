//! # Marga-Plan: Sampling-Based Motion Planning
//!
//! A motion-planning engine over host-defined configuration spaces. The
//! host supplies the problem semantics as callbacks (sampling, distance,
//! interpolation, feasibility and visibility predicates); the engine builds
//! a roadmap or tree incrementally until the start connects to the goal.
//!
//! ## Features
//!
//! - **Callback-defined C-spaces**: the engine never interprets what a
//!   configuration means
//! - **Adaptive constraint scheduling**: per-constraint cost and pass-rate
//!   statistics reorder feasibility/visibility tests to minimize expected
//!   rejection time, including over prerequisite chains
//! - **Two planner families**: multi-query roadmaps (`prm`, `prm*`) and
//!   single-query trees (`rrt`, `rrt*`, bidirectional)
//! - **Goal regions**: plan to a membership predicate instead of a point
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use marga_plan::config::PlannerConfig;
//! use marga_plan::cspace::CSpace;
//! use marga_plan::planning::Planner;
//!
//! // A 2-D unit box with a deterministic sampler.
//! let mut space = CSpace::new();
//! let mut state = 1u64;
//! space.set_sampler(Box::new(move || {
//!     let mut draw = || {
//!         state ^= state << 13;
//!         state ^= state >> 7;
//!         state ^= state << 17;
//!         (state >> 11) as f64 / (1u64 << 53) as f64
//!     };
//!     Ok(vec![draw(), draw()])
//! }));
//! space.add_feasibility_test("box", |q: &[f64]| {
//!     Ok(q.iter().all(|&x| (0.0..=1.0).contains(&x)))
//! });
//! space.set_edge_resolution(0.01)?;
//!
//! let mut config = PlannerConfig::default();
//! config.set_numeric("knn", 5.0)?;
//! config.set_numeric("connectionThreshold", 0.3)?;
//!
//! let mut planner = Planner::new(&config, Rc::new(RefCell::new(space)))?;
//! planner.set_endpoints(&vec![0.1, 0.1], &vec![0.9, 0.9])?;
//! while !planner.is_solved() {
//!     planner.plan_more(10)?;
//! }
//! let path = planner.get_solution()?.expect("solved");
//! assert_eq!(path[0], vec![0.1, 0.1]);
//! # Ok::<(), marga_plan::PlanError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: configuration vectors and the default metric
//! - [`cspace`]: the C-space abstraction, constraint table, stats and the
//!   test-order optimizer, goal sets
//! - [`edge`]: edge planners (bisection and callback-driven visibility)
//! - [`config`]: the planner settings record with JSON round-trip
//! - [`planning`]: roadmap graph, the two drivers, the planner facade
//! - [`registry`]: integer-handle tables with free-list allocation
//!
//! ## Threading
//!
//! The engine is single-threaded by contract: callbacks are assumed
//! non-reentrant, a planner instance is not reentrant, and a space may be
//! shared by several planners only serially.

pub mod config;
pub mod core;
pub mod cspace;
pub mod edge;
pub mod planning;
pub mod registry;

mod error;

pub use config::PlannerConfig;
pub use cspace::{CSpace, GoalSet, TesterStats};
pub use edge::EdgePlanner;
pub use error::{CallbackError, CallbackResult, PlanError, Result};
pub use planning::{MotionPlanner, Planner, Roadmap};
pub use registry::Registry;
