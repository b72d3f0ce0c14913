//! Multi-query probabilistic roadmap driver.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::PlannerConfig;
use crate::core::Config;
use crate::cspace::{CSpace, GoalSet};
use crate::error::{PlanError, Result};

use super::roadmap::Roadmap;
use super::{best_goal_path, solved_state, MotionPlanner};

/// With a goal set attached, every N-th iteration samples the goal region
/// instead of the whole space.
const GOAL_SEED_PERIOD: usize = 10;

/// Probabilistic roadmap planner.
///
/// Each iteration samples one configuration, keeps it if feasible, and
/// tries to connect it to its nearest milestones through the edge planner.
/// The `prm*` variant grows the connection count logarithmically with the
/// roadmap size.
pub struct PrmPlanner {
    space: Rc<RefCell<CSpace>>,
    roadmap: Roadmap,
    knn: usize,
    star: bool,
    suboptimality_factor: f64,
    connection_threshold: f64,
    ignore_components: bool,
    goal: Option<GoalSet>,
    goal_milestones: Vec<usize>,
    two_point: bool,
    iterations: usize,
    samples_rejected: usize,
    edges_tested: usize,
}

impl PrmPlanner {
    pub fn new(
        space: Rc<RefCell<CSpace>>,
        config: &PlannerConfig,
        goal: Option<GoalSet>,
        star: bool,
    ) -> Self {
        Self {
            space,
            roadmap: Roadmap::new(),
            knn: config.knn,
            star,
            suboptimality_factor: config.suboptimality_factor,
            connection_threshold: config.connection_threshold,
            ignore_components: config.ignore_connected_components,
            goal,
            goal_milestones: Vec::new(),
            two_point: false,
            iterations: 0,
            samples_rejected: 0,
            edges_tested: 0,
        }
    }

    /// Connection count for a roadmap of `n` milestones.
    ///
    /// `prm*` uses the classical `e·(1 + η)·ln n` growth; zero means
    /// "every milestone within the threshold".
    fn effective_knn(&self, n: usize) -> usize {
        if self.star {
            let grown =
                ((1.0 + self.suboptimality_factor) * std::f64::consts::E * (n as f64 + 1.0).ln())
                    .ceil() as usize;
            self.knn.max(grown)
        } else {
            self.knn
        }
    }

    /// Insert without a feasibility check and wire it into the roadmap.
    fn insert_and_connect(&mut self, q: Config) -> Result<usize> {
        let idx = self.roadmap.add_node(q);
        self.connect(idx)?;
        Ok(idx)
    }

    /// Try edges from `idx` to its nearest milestones.
    fn connect(&mut self, idx: usize) -> Result<()> {
        let n = self.roadmap.num_nodes();
        if n < 2 {
            return Ok(());
        }
        let q = match self.roadmap.node(idx) {
            Some(q) => q.clone(),
            None => return Ok(()),
        };

        let mut candidates: Vec<(f64, usize)> = Vec::with_capacity(n - 1);
        {
            let mut space = self.space.borrow_mut();
            for j in 0..n {
                if j == idx {
                    continue;
                }
                if let Some(other) = self.roadmap.node(j) {
                    let d = space.distance(&q, other)?;
                    if d <= self.connection_threshold {
                        candidates.push((d, j));
                    }
                }
            }
        }
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let k = self.effective_knn(n);
        let limit = if k == 0 { candidates.len() } else { k };
        for &(d, j) in candidates.iter().take(limit) {
            if !self.ignore_components && self.roadmap.same_component(idx, j) {
                continue;
            }
            let other = match self.roadmap.node(j) {
                Some(o) => o.clone(),
                None => continue,
            };
            self.edges_tested += 1;
            if self.space.borrow_mut().is_visible(&q, &other)? {
                self.roadmap.add_edge(idx, j, d);
            }
        }
        Ok(())
    }

    /// Draw one goal-region configuration and insert it if admissible.
    fn seed_goal(&mut self) -> Result<()> {
        let q = match self.goal.as_mut() {
            Some(goal) => {
                let q = goal.sample()?;
                if !goal.is_feasible(&q)? {
                    self.samples_rejected += 1;
                    return Ok(());
                }
                q
            }
            None => return Ok(()),
        };
        let idx = self.insert_and_connect(q)?;
        self.goal_milestones.push(idx);
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        self.iterations += 1;

        if self.goal.is_some()
            && (self.goal_milestones.is_empty() || self.iterations % GOAL_SEED_PERIOD == 0)
        {
            return self.seed_goal();
        }

        let q = self.space.borrow_mut().sample()?;
        if !self.space.borrow_mut().is_feasible(&q)? {
            self.samples_rejected += 1;
            return Ok(());
        }
        self.insert_and_connect(q)?;
        Ok(())
    }
}

impl MotionPlanner for PrmPlanner {
    fn add_milestone(&mut self, q: &Config) -> Result<Option<usize>> {
        if !self.space.borrow_mut().is_feasible(q)? {
            return Ok(None);
        }
        let idx = self.insert_and_connect(q.clone())?;
        if idx == 1 && self.goal.is_none() {
            self.two_point = true;
        }
        Ok(Some(idx))
    }

    fn plan_more(&mut self, iterations: usize) -> Result<()> {
        if self.roadmap.num_nodes() == 0 {
            return Err(PlanError::InvalidArgument(
                "plan_more before any start milestone".to_string(),
            ));
        }
        for _ in 0..iterations {
            self.step()?;
        }
        Ok(())
    }

    fn restart_from_endpoints(&mut self) -> Result<()> {
        let start = self.roadmap.node(0).cloned();
        let goal = if self.two_point {
            self.roadmap.node(1).cloned()
        } else {
            None
        };
        self.roadmap = Roadmap::new();
        self.goal_milestones.clear();
        self.iterations = 0;
        self.samples_rejected = 0;
        self.edges_tested = 0;
        if let Some(q) = start {
            self.insert_and_connect(q)?;
        }
        if let Some(q) = goal {
            self.insert_and_connect(q)?;
        }
        Ok(())
    }

    fn num_iterations(&self) -> usize {
        self.iterations
    }

    fn roadmap(&self) -> &Roadmap {
        &self.roadmap
    }

    fn is_solved(&self) -> bool {
        solved_state(&self.roadmap, self.two_point, &self.goal_milestones)
    }

    fn get_solution(&self) -> Option<Vec<Config>> {
        best_goal_path(&self.roadmap, self.two_point, &self.goal_milestones)
    }

    fn stats(&self) -> HashMap<String, String> {
        let mut stats = HashMap::new();
        stats.insert(
            "planner".to_string(),
            if self.star { "prm*" } else { "prm" }.to_string(),
        );
        stats.insert("iterations".to_string(), self.iterations.to_string());
        stats.insert(
            "milestones".to_string(),
            self.roadmap.num_nodes().to_string(),
        );
        stats.insert("edges".to_string(), self.roadmap.num_edges().to_string());
        stats.insert(
            "components".to_string(),
            self.roadmap.num_components().to_string(),
        );
        stats.insert(
            "samplesRejected".to_string(),
            self.samples_rejected.to_string(),
        );
        stats.insert("edgesTested".to_string(), self.edges_tested.to_string());
        stats.insert(
            "goalMilestones".to_string(),
            self.goal_milestones.len().to_string(),
        );
        stats
    }
}
