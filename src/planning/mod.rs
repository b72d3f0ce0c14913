//! Incremental sampling-based planners over a configuration space.
//!
//! Two drivers cover the factory's planner catalogue: a multi-query roadmap
//! driver ([`PrmPlanner`], tags `prm` and `prm*`) and a tree driver
//! ([`RrtPlanner`], tags `rrt`, `rrt*` and `sbl`). The [`Planner`] facade
//! owns one driver, re-optimizes the space's constraint order before
//! stepping, and layers endpoint management, restarts and shortcut
//! smoothing on top.

mod planner;
mod prm;
mod roadmap;
mod rrt;
mod smoothing;

pub use planner::Planner;
pub use prm::PrmPlanner;
pub use roadmap::Roadmap;
pub use rrt::RrtPlanner;
pub use smoothing::shortcut_path;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rand::rngs::StdRng;

use crate::config::PlannerConfig;
use crate::core::Config;
use crate::cspace::{CSpace, GoalSet};
use crate::error::{PlanError, Result};

/// Common contract of the planner drivers.
///
/// A driver owns its roadmap and per-algorithm structures; milestone
/// indices are dense, start at 0 and are never reused.
pub trait MotionPlanner {
    /// Insert a milestone after validating feasibility.
    ///
    /// Returns `None` when the configuration is infeasible, leaving the
    /// milestone count unchanged.
    fn add_milestone(&mut self, q: &Config) -> Result<Option<usize>>;

    /// Run the given number of planning iterations.
    fn plan_more(&mut self, iterations: usize) -> Result<()>;

    /// Clear all progress but the endpoint milestones and start over.
    fn restart_from_endpoints(&mut self) -> Result<()>;

    /// Iterations run since construction or the last restart.
    fn num_iterations(&self) -> usize;

    /// The current milestone graph.
    fn roadmap(&self) -> &Roadmap;

    /// True once the start is connected to the goal (or any goal milestone).
    fn is_solved(&self) -> bool;

    /// The current best start-to-goal milestone path.
    fn get_solution(&self) -> Option<Vec<Config>>;

    /// Engine counters as a string map.
    fn stats(&self) -> HashMap<String, String>;

    fn num_milestones(&self) -> usize {
        self.roadmap().num_nodes()
    }

    fn num_components(&self) -> usize {
        self.roadmap().num_components()
    }

    fn is_connected(&self, i: usize, j: usize) -> bool {
        self.roadmap().same_component(i, j)
    }

    /// Milestone path between two indices, if connected.
    fn get_path(&self, i: usize, j: usize) -> Option<Vec<Config>> {
        let (indices, _) = self.roadmap().shortest_path(i, j)?;
        Some(
            indices
                .into_iter()
                .filter_map(|k| self.roadmap().node(k).cloned())
                .collect(),
        )
    }
}

/// Shared solved test: two-point problems need milestones 0 and 1
/// connected, goal-set problems need any goal milestone reachable from 0.
pub(crate) fn solved_state(roadmap: &Roadmap, two_point: bool, goal_milestones: &[usize]) -> bool {
    if roadmap.num_nodes() == 0 {
        return false;
    }
    if two_point {
        return roadmap.num_nodes() > 1 && roadmap.same_component(0, 1);
    }
    goal_milestones.iter().any(|&g| roadmap.same_component(0, g))
}

/// Shared solution extraction: the shortest path from the start to the goal
/// (or to the nearest connected goal milestone).
pub(crate) fn best_goal_path(
    roadmap: &Roadmap,
    two_point: bool,
    goal_milestones: &[usize],
) -> Option<Vec<Config>> {
    let targets: Vec<usize> = if two_point {
        vec![1]
    } else {
        goal_milestones.to_vec()
    };
    let mut best: Option<(Vec<usize>, f64)> = None;
    for goal in targets {
        if let Some((path, dist)) = roadmap.shortest_path(0, goal) {
            let better = match &best {
                Some((_, d)) => dist < *d,
                None => true,
            };
            if better {
                best = Some((path, dist));
            }
        }
    }
    let (indices, _) = best?;
    Some(
        indices
            .into_iter()
            .filter_map(|k| roadmap.node(k).cloned())
            .collect(),
    )
}

/// Build the driver a settings record asks for.
pub fn create_driver(
    config: &PlannerConfig,
    space: Rc<RefCell<CSpace>>,
    goal: Option<GoalSet>,
    rng: StdRng,
) -> Result<Box<dyn MotionPlanner>> {
    match config.planner_type.as_str() {
        "prm" => Ok(Box::new(PrmPlanner::new(space, config, goal, false))),
        "prm*" => Ok(Box::new(PrmPlanner::new(space, config, goal, true))),
        "rrt" => Ok(Box::new(RrtPlanner::new(space, config, goal, false, rng))),
        "rrt*" => Ok(Box::new(RrtPlanner::new(space, config, goal, true, rng))),
        "sbl" => {
            // The single-query bidirectional tree driver stands in for SBL.
            let mut cfg = config.clone();
            cfg.bidirectional = true;
            Ok(Box::new(RrtPlanner::new(space, &cfg, goal, false, rng)))
        }
        "est" => {
            let mut cfg = config.clone();
            cfg.bidirectional = false;
            Ok(Box::new(RrtPlanner::new(space, &cfg, goal, false, rng)))
        }
        other => Err(PlanError::InvalidArgument(format!(
            "unknown planner type '{other}'"
        ))),
    }
}
