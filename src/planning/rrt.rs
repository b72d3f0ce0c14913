//! Single-query tree driver: RRT, RRT*, and the bidirectional variant.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::PlannerConfig;
use crate::core::Config;
use crate::cspace::{CSpace, GoalSet};
use crate::error::{PlanError, Result};

use super::roadmap::Roadmap;
use super::{best_goal_path, solved_state, MotionPlanner};

/// Fraction of extensions aimed straight at the goal configuration.
const GOAL_BIAS: f64 = 0.1;

/// Every N-th iteration seeds a goal-region milestone when a goal set is
/// attached.
const GOAL_SEED_PERIOD: usize = 10;

/// Tree membership marker: start tree, goal tree, or not yet attached.
const TREE_START: i8 = 0;
const TREE_GOAL: i8 = 1;
const TREE_NONE: i8 = -1;

/// Rapidly-exploring random tree planner.
///
/// Grows a tree from the start milestone by stepping at most
/// `perturbation_radius` toward sampled targets. `bidirectional` grows a
/// second tree from the goal and joins them within `connection_threshold`;
/// the `rrt*` variant re-parents new nodes and rewires their neighborhood
/// by path cost.
pub struct RrtPlanner {
    space: Rc<RefCell<CSpace>>,
    roadmap: Roadmap,
    /// Tree parent per milestone (roots and floating milestones have none).
    parents: Vec<Option<usize>>,
    /// Which tree each milestone belongs to.
    tree_of: Vec<i8>,
    /// Path cost from the tree root.
    cost: Vec<f64>,
    perturbation_radius: f64,
    connection_threshold: f64,
    bidirectional: bool,
    star: bool,
    randomize_frequency: usize,
    goal: Option<GoalSet>,
    goal_milestones: Vec<usize>,
    two_point: bool,
    iterations: usize,
    extensions_rejected: usize,
    rng: StdRng,
}

impl RrtPlanner {
    pub fn new(
        space: Rc<RefCell<CSpace>>,
        config: &PlannerConfig,
        goal: Option<GoalSet>,
        star: bool,
        rng: StdRng,
    ) -> Self {
        Self {
            space,
            roadmap: Roadmap::new(),
            parents: Vec::new(),
            tree_of: Vec::new(),
            cost: Vec::new(),
            perturbation_radius: config.perturbation_radius,
            connection_threshold: config.connection_threshold,
            bidirectional: config.bidirectional,
            star,
            randomize_frequency: config.randomize_frequency,
            goal,
            goal_milestones: Vec::new(),
            two_point: false,
            iterations: 0,
            extensions_rejected: 0,
            rng,
        }
    }

    /// Insert a milestone with explicit tree bookkeeping.
    fn insert(&mut self, q: Config, tree: i8, parent: Option<usize>, cost: f64) -> usize {
        let idx = self.roadmap.add_node(q);
        self.parents.push(parent);
        self.tree_of.push(tree);
        self.cost.push(cost);
        idx
    }

    /// Nearest milestone whose tree marker passes `keep`, by C-space
    /// distance.
    fn nearest_matching<F>(&mut self, q: &Config, keep: F) -> Result<Option<(usize, f64)>>
    where
        F: Fn(i8) -> bool,
    {
        let mut best: Option<(usize, f64)> = None;
        let mut space = self.space.borrow_mut();
        for i in 0..self.roadmap.num_nodes() {
            if !keep(self.tree_of[i]) {
                continue;
            }
            if let Some(node) = self.roadmap.node(i) {
                let d = space.distance(node, q)?;
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((i, d));
                }
            }
        }
        Ok(best)
    }

    /// Sample a goal-region configuration and park it as a floating
    /// milestone for the tree to bridge to.
    fn seed_goal(&mut self) -> Result<()> {
        let q = match self.goal.as_mut() {
            Some(goal) => {
                let q = goal.sample()?;
                if !goal.is_feasible(&q)? {
                    self.extensions_rejected += 1;
                    return Ok(());
                }
                q
            }
            None => return Ok(()),
        };
        let idx = self.insert(q, TREE_NONE, None, f64::INFINITY);
        self.goal_milestones.push(idx);
        Ok(())
    }

    /// Inject one plain random milestone, floating until bridged.
    fn inject_random(&mut self) -> Result<()> {
        let q = self.space.borrow_mut().sample()?;
        if !self.space.borrow_mut().is_feasible(&q)? {
            self.extensions_rejected += 1;
            return Ok(());
        }
        self.insert(q, TREE_NONE, None, f64::INFINITY);
        Ok(())
    }

    /// Pick the extension target for this iteration.
    fn pick_target(&mut self) -> Result<Config> {
        if self.two_point && !self.bidirectional && self.rng.gen::<f64>() < GOAL_BIAS {
            if let Some(goal) = self.roadmap.node(1) {
                return Ok(goal.clone());
            }
        }
        self.space.borrow_mut().sample()
    }

    /// One tree extension.
    fn step(&mut self) -> Result<()> {
        self.iterations += 1;

        if self.goal.is_some()
            && (self.goal_milestones.is_empty() || self.iterations % GOAL_SEED_PERIOD == 0)
        {
            return self.seed_goal();
        }
        if self.randomize_frequency > 0 && self.iterations % self.randomize_frequency == 0 {
            return self.inject_random();
        }

        let target = self.pick_target()?;
        let tree = if self.bidirectional
            && self.iterations % 2 == 1
            && self.tree_of.contains(&TREE_GOAL)
        {
            TREE_GOAL
        } else {
            TREE_START
        };
        let (near_idx, d) = match self.nearest_matching(&target, |t| t == tree)? {
            Some(found) => found,
            None => return Ok(()),
        };
        if d == 0.0 {
            return Ok(());
        }
        let qnear = match self.roadmap.node(near_idx) {
            Some(q) => q.clone(),
            None => return Ok(()),
        };
        let qnew = if d > self.perturbation_radius {
            self.space
                .borrow_mut()
                .interpolate(&qnear, &target, self.perturbation_radius / d)?
        } else {
            target
        };
        if !self.space.borrow_mut().is_feasible(&qnew)? {
            self.extensions_rejected += 1;
            return Ok(());
        }
        if !self.space.borrow_mut().is_visible(&qnear, &qnew)? {
            self.extensions_rejected += 1;
            return Ok(());
        }
        let step_len = self.space.borrow_mut().distance(&qnear, &qnew)?;
        let idx = self.insert(qnew, tree, Some(near_idx), self.cost[near_idx] + step_len);
        self.roadmap.add_edge(near_idx, idx, step_len);

        if self.star {
            self.rewire(idx, tree)?;
        }
        self.try_bridge(idx, tree)?;

        // A goal-set extension may have landed inside the goal region.
        if let Some(goal) = self.goal.as_mut() {
            if let Some(q) = self.roadmap.node(idx) {
                if goal.is_goal(q)? {
                    self.goal_milestones.push(idx);
                }
            }
        }
        Ok(())
    }

    /// Connect the new node to the nearest milestone outside its tree when
    /// within the connection threshold; floating milestones are adopted.
    fn try_bridge(&mut self, idx: usize, tree: i8) -> Result<()> {
        let q = match self.roadmap.node(idx) {
            Some(q) => q.clone(),
            None => return Ok(()),
        };
        let (other, d) = match self.nearest_matching(&q, |t| t != tree)? {
            Some(found) => found,
            None => return Ok(()),
        };
        if d > self.connection_threshold {
            return Ok(());
        }
        let qother = match self.roadmap.node(other) {
            Some(o) => o.clone(),
            None => return Ok(()),
        };
        if !self.space.borrow_mut().is_visible(&q, &qother)? {
            return Ok(());
        }
        self.roadmap.add_edge(idx, other, d);
        if self.tree_of[other] == TREE_NONE {
            self.tree_of[other] = tree;
            self.parents[other] = Some(idx);
            self.cost[other] = self.cost[idx] + d;
        }
        Ok(())
    }

    /// RRT* rewiring: re-parent the new node from its neighborhood by path
    /// cost, then route neighbors through it where that is cheaper.
    fn rewire(&mut self, idx: usize, tree: i8) -> Result<()> {
        let radius = self.perturbation_radius;
        let q = match self.roadmap.node(idx) {
            Some(q) => q.clone(),
            None => return Ok(()),
        };

        let mut neighborhood: Vec<(usize, f64)> = Vec::new();
        {
            let mut space = self.space.borrow_mut();
            for j in 0..self.roadmap.num_nodes() {
                if j == idx || self.tree_of[j] != tree || Some(j) == self.parents[idx] {
                    continue;
                }
                if let Some(node) = self.roadmap.node(j) {
                    let d = space.distance(node, &q)?;
                    if d <= radius {
                        neighborhood.push((j, d));
                    }
                }
            }
        }

        // Best parent for the new node.
        for &(j, d) in &neighborhood {
            let through = self.cost[j] + d;
            if through + 1e-12 < self.cost[idx] {
                let qj = match self.roadmap.node(j) {
                    Some(n) => n.clone(),
                    None => continue,
                };
                if self.space.borrow_mut().is_visible(&qj, &q)? {
                    if let Some(old) = self.parents[idx] {
                        self.roadmap.remove_edge(old, idx);
                    }
                    self.roadmap.add_edge(j, idx, d);
                    self.parents[idx] = Some(j);
                    self.cost[idx] = through;
                }
            }
        }

        // Reroute neighbors through the new node where cheaper.
        for &(j, d) in &neighborhood {
            if Some(j) == self.parents[idx] {
                continue;
            }
            let through = self.cost[idx] + d;
            if through + 1e-12 < self.cost[j] {
                let qj = match self.roadmap.node(j) {
                    Some(n) => n.clone(),
                    None => continue,
                };
                if self.space.borrow_mut().is_visible(&q, &qj)? {
                    if let Some(old) = self.parents[j] {
                        self.roadmap.remove_edge(old, j);
                    }
                    self.roadmap.add_edge(idx, j, d);
                    self.parents[j] = Some(idx);
                    self.cost[j] = through;
                    self.propagate_costs(j);
                }
            }
        }
        Ok(())
    }

    /// Refresh subtree costs after a re-parenting.
    fn propagate_costs(&mut self, root: usize) {
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            for j in 0..self.parents.len() {
                if self.parents[j] == Some(i) {
                    let edge = self
                        .roadmap
                        .neighbors(j)
                        .iter()
                        .find(|&&(k, _)| k == i)
                        .map(|&(_, w)| w)
                        .unwrap_or(0.0);
                    self.cost[j] = self.cost[i] + edge;
                    stack.push(j);
                }
            }
        }
    }
}

impl MotionPlanner for RrtPlanner {
    fn add_milestone(&mut self, q: &Config) -> Result<Option<usize>> {
        if !self.space.borrow_mut().is_feasible(q)? {
            return Ok(None);
        }
        let next = self.roadmap.num_nodes();
        let idx = match next {
            0 => self.insert(q.clone(), TREE_START, None, 0.0),
            1 if self.goal.is_none() => {
                self.two_point = true;
                if self.bidirectional {
                    self.insert(q.clone(), TREE_GOAL, None, 0.0)
                } else {
                    self.insert(q.clone(), TREE_NONE, None, f64::INFINITY)
                }
            }
            _ => self.insert(q.clone(), TREE_NONE, None, f64::INFINITY),
        };
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
        self.parents.clear();
        self.tree_of.clear();
        self.cost.clear();
        self.goal_milestones.clear();
        self.iterations = 0;
        self.extensions_rejected = 0;
        if let Some(q) = start {
            self.insert(q, TREE_START, None, 0.0);
        }
        if let Some(q) = goal {
            if self.bidirectional {
                self.insert(q, TREE_GOAL, None, 0.0);
            } else {
                self.insert(q, TREE_NONE, None, f64::INFINITY);
            }
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
            if self.star { "rrt*" } else { "rrt" }.to_string(),
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
            "extensionsRejected".to_string(),
            self.extensions_rejected.to_string(),
        );
        stats.insert(
            "goalMilestones".to_string(),
            self.goal_milestones.len().to_string(),
        );
        stats.insert(
            "bidirectional".to_string(),
            (self.bidirectional as u8).to_string(),
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn make_free_square() -> Rc<RefCell<CSpace>> {
        let mut space = CSpace::new();
        let mut state = 2463534242u64;
        space.set_sampler(Box::new(move || {
            let mut draw = || {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 11) as f64 / (1u64 << 53) as f64
            };
            Ok(vec![draw(), draw()])
        }));
        space.add_feasibility_test("box", |q: &[f64]| {
            Ok(q.iter().all(|&x| (0.0..=1.0).contains(&x)))
        });
        space.set_edge_resolution(0.01).unwrap();
        Rc::new(RefCell::new(space))
    }

    fn make_rrt(space: Rc<RefCell<CSpace>>, bidirectional: bool, star: bool) -> RrtPlanner {
        let mut config = PlannerConfig::default();
        config.perturbation_radius = 0.2;
        config.connection_threshold = 0.25;
        config.bidirectional = bidirectional;
        RrtPlanner::new(space, &config, None, star, StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_unidirectional_solves_free_square() {
        let mut rrt = make_rrt(make_free_square(), false, false);
        rrt.add_milestone(&vec![0.1, 0.1]).unwrap();
        rrt.add_milestone(&vec![0.9, 0.9]).unwrap();
        rrt.plan_more(500).unwrap();
        assert!(rrt.is_solved());
        let path = rrt.get_solution().unwrap();
        assert_eq!(path[0], vec![0.1, 0.1]);
        assert_eq!(path[path.len() - 1], vec![0.9, 0.9]);
    }

    #[test]
    fn test_bidirectional_solves_free_square() {
        let mut rrt = make_rrt(make_free_square(), true, false);
        rrt.add_milestone(&vec![0.1, 0.1]).unwrap();
        rrt.add_milestone(&vec![0.9, 0.9]).unwrap();
        rrt.plan_more(500).unwrap();
        assert!(rrt.is_solved());
    }

    #[test]
    fn test_star_costs_stay_consistent() {
        let mut rrt = make_rrt(make_free_square(), false, true);
        rrt.add_milestone(&vec![0.1, 0.1]).unwrap();
        rrt.add_milestone(&vec![0.9, 0.9]).unwrap();
        rrt.plan_more(300).unwrap();
        // Every tree node's cost must equal its parent's cost plus the
        // connecting edge length.
        for i in 0..rrt.roadmap.num_nodes() {
            if let Some(p) = rrt.parents[i] {
                let edge = rrt
                    .roadmap
                    .neighbors(i)
                    .iter()
                    .find(|&&(k, _)| k == p)
                    .map(|&(_, w)| w)
                    .unwrap();
                assert!((rrt.cost[i] - (rrt.cost[p] + edge)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_infeasible_milestone_rejected() {
        let mut rrt = make_rrt(make_free_square(), false, false);
        assert_eq!(rrt.add_milestone(&vec![-1.0, 0.5]).unwrap(), None);
        assert_eq!(rrt.num_milestones(), 0);
    }

    #[test]
    fn test_extension_respects_step_length() {
        let mut rrt = make_rrt(make_free_square(), false, false);
        rrt.add_milestone(&vec![0.5, 0.5]).unwrap();
        rrt.plan_more(50).unwrap();
        // No edge may exceed the perturbation radius by more than the
        // bridging threshold allows.
        for (i, j) in rrt.roadmap.edge_pairs() {
            let a = rrt.roadmap.node(i).unwrap();
            let b = rrt.roadmap.node(j).unwrap();
            let d = crate::core::euclidean_distance(a, b);
            assert!(d <= rrt.connection_threshold.max(rrt.perturbation_radius) + 1e-9);
        }
    }
}
