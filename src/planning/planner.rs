//! The host-facing planner: endpoints, incremental stepping, solutions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{PlannerConfig, RestartTermCond};
use crate::core::Config;
use crate::cspace::{CSpace, GoalSampleFn, GoalSet, GoalTestFn};
use crate::error::{PlanError, Result};

use super::smoothing::shortcut_path;
use super::{create_driver, MotionPlanner, Roadmap};

/// A planner instance bound to one configuration space.
///
/// Constructed by a [`PlannerConfig`] acting as the factory; the settings
/// record decides the driver algorithm and its tuning. The facade adds the
/// endpoint workflow, query-order re-optimization before every stepping
/// call, stagnation restarts, and optional shortcut smoothing of solutions.
///
/// # Example
///
/// ```rust,ignore
/// use marga_plan::config::PlannerConfig;
/// use marga_plan::planning::Planner;
///
/// let mut config = PlannerConfig::default();
/// config.set_numeric("knn", 5.0)?;
/// config.set_numeric("connectionThreshold", 0.3)?;
/// let mut planner = Planner::new(&config, space)?;
/// planner.set_endpoints(&vec![0.1, 0.1], &vec![0.9, 0.9])?;
/// while !planner.is_solved() {
///     planner.plan_more(10)?;
/// }
/// let path = planner.get_solution()?;
/// ```
pub struct Planner {
    config: PlannerConfig,
    space: Rc<RefCell<CSpace>>,
    driver: Box<dyn MotionPlanner>,
    restart_cond: Option<RestartTermCond>,
    rng: StdRng,
}

impl Planner {
    /// Create a planner with a deterministic default seed.
    pub fn new(config: &PlannerConfig, space: Rc<RefCell<CSpace>>) -> Result<Self> {
        Self::with_rng(config, space, StdRng::seed_from_u64(0))
    }

    /// Create a planner drawing its random stream from `rng`.
    pub fn with_rng(
        config: &PlannerConfig,
        space: Rc<RefCell<CSpace>>,
        mut rng: StdRng,
    ) -> Result<Self> {
        let driver_rng = StdRng::seed_from_u64(rng.gen());
        let driver = create_driver(config, space.clone(), None, driver_rng)?;
        let restart_cond = if config.restart {
            Some(RestartTermCond::parse(&config.restart_term_cond)?)
        } else {
            None
        };
        Ok(Self {
            config: config.clone(),
            space,
            driver,
            restart_cond,
            rng,
        })
    }

    /// Insert a milestone; `None` when the configuration is infeasible.
    pub fn add_milestone(&mut self, q: &Config) -> Result<Option<usize>> {
        self.driver.add_milestone(q)
    }

    /// Set the start and goal configurations as milestones 0 and 1.
    ///
    /// Both endpoints are feasibility-checked on insertion; an infeasible
    /// start leaves the planner empty.
    pub fn set_endpoints(&mut self, start: &Config, goal: &Config) -> Result<()> {
        match self.driver.add_milestone(start)? {
            Some(0) => {}
            Some(_) => {
                return Err(PlanError::InvalidArgument(
                    "planner already initialized".to_string(),
                ))
            }
            None => return Err(PlanError::InfeasibleEndpoint("Start")),
        }
        if self.driver.add_milestone(goal)?.is_none() {
            return Err(PlanError::InfeasibleEndpoint("Goal"));
        }
        Ok(())
    }

    /// Set the start configuration and a goal region.
    ///
    /// Rebuilds the driver through the factory settings, bound to a
    /// [`GoalSet`] over the planner's space.
    pub fn set_endpoint_set(
        &mut self,
        start: &Config,
        goal_test: GoalTestFn,
        goal_sample: Option<GoalSampleFn>,
    ) -> Result<()> {
        let goal = GoalSet::new(self.space.clone(), goal_test, goal_sample);
        let driver_rng = StdRng::seed_from_u64(self.rng.gen());
        let mut driver = create_driver(&self.config, self.space.clone(), Some(goal), driver_rng)?;
        if driver.add_milestone(start)?.is_none() {
            return Err(PlanError::InfeasibleEndpoint("Start"));
        }
        self.driver = driver;
        Ok(())
    }

    /// Run `iterations` planning iterations.
    ///
    /// Re-optimizes the space's constraint query order first, and applies
    /// the restart policy when one is configured.
    pub fn plan_more(&mut self, iterations: usize) -> Result<()> {
        if self.driver.num_milestones() == 0 {
            return Err(PlanError::InvalidArgument(
                "plan_more before any start milestone".to_string(),
            ));
        }
        self.space.borrow_mut().optimize_query_order();
        for _ in 0..iterations {
            self.driver.plan_more(1)?;
            if let Some(cond) = self.restart_cond {
                let solved = self.driver.is_solved();
                let keep_solution = cond.found_solution != 0 && solved;
                if !keep_solution && self.driver.num_iterations() >= cond.max_iters {
                    log::debug!(
                        "restarting after {} stagnant iterations",
                        self.driver.num_iterations()
                    );
                    self.driver.restart_from_endpoints()?;
                }
            }
        }
        Ok(())
    }

    pub fn is_solved(&self) -> bool {
        self.driver.is_solved()
    }

    pub fn is_connected(&self, i: usize, j: usize) -> bool {
        self.driver.is_connected(i, j)
    }

    /// The current best start-to-goal path, shortcut-smoothed when the
    /// `shortcut` setting is on.
    pub fn get_solution(&mut self) -> Result<Option<Vec<Config>>> {
        let path = match self.driver.get_solution() {
            Some(p) => p,
            None => return Ok(None),
        };
        if self.config.shortcut {
            let mut space = self.space.borrow_mut();
            return Ok(Some(shortcut_path(&mut space, &path)?));
        }
        Ok(Some(path))
    }

    /// Milestone path between two indices, if they are connected.
    pub fn get_path(&self, i: usize, j: usize) -> Option<Vec<Config>> {
        self.driver.get_path(i, j)
    }

    /// The roadmap as `(nodes, edges)` with unordered index pairs.
    pub fn get_roadmap(&self) -> (Vec<Config>, Vec<(usize, usize)>) {
        let map = self.driver.roadmap();
        (map.nodes().to_vec(), map.edge_pairs())
    }

    /// Direct access to the milestone graph.
    pub fn roadmap(&self) -> &Roadmap {
        self.driver.roadmap()
    }

    pub fn num_iterations(&self) -> usize {
        self.driver.num_iterations()
    }

    pub fn num_milestones(&self) -> usize {
        self.driver.num_milestones()
    }

    pub fn num_components(&self) -> usize {
        self.driver.num_components()
    }

    /// Engine counters as a string map.
    pub fn get_stats(&self) -> HashMap<String, String> {
        self.driver.stats()
    }

    /// The roadmap in Trivial Graph Format.
    pub fn to_tgf(&self) -> String {
        self.driver.roadmap().to_tgf()
    }

    /// The space this planner is bound to.
    pub fn space(&self) -> &Rc<RefCell<CSpace>> {
        &self.space
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_free_square() -> Rc<RefCell<CSpace>> {
        let mut space = CSpace::new();
        let mut state = 0x9e3779b97f4a7c15u64;
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

    fn make_planner(planner_type: &str) -> Planner {
        let mut config = PlannerConfig::default();
        config.set_string("type", planner_type).unwrap();
        config.set_numeric("knn", 5.0).unwrap();
        config.set_numeric("connectionThreshold", 0.3).unwrap();
        config.set_numeric("perturbationRadius", 0.2).unwrap();
        Planner::new(&config, make_free_square()).unwrap()
    }

    #[test]
    fn test_unknown_planner_type_rejected() {
        let mut config = PlannerConfig::default();
        config.set_string("type", "teleport").unwrap();
        assert!(Planner::new(&config, make_free_square()).is_err());
    }

    #[test]
    fn test_infeasible_start_leaves_planner_empty() {
        let mut planner = make_planner("prm");
        let err = planner
            .set_endpoints(&vec![-1.0, 0.5], &vec![0.9, 0.9])
            .unwrap_err();
        assert!(matches!(err, PlanError::InfeasibleEndpoint("Start")));
        assert_eq!(planner.num_milestones(), 0);
    }

    #[test]
    fn test_infeasible_goal_reported() {
        let mut planner = make_planner("prm");
        let err = planner
            .set_endpoints(&vec![0.1, 0.1], &vec![2.0, 2.0])
            .unwrap_err();
        assert!(matches!(err, PlanError::InfeasibleEndpoint("Goal")));
    }

    #[test]
    fn test_plan_more_requires_initialization() {
        let mut planner = make_planner("prm");
        assert!(planner.plan_more(1).is_err());
    }

    #[test]
    fn test_prm_end_to_end() {
        let mut planner = make_planner("prm");
        planner
            .set_endpoints(&vec![0.1, 0.1], &vec![0.9, 0.9])
            .unwrap();
        let mut calls = 0;
        while !planner.is_solved() && calls < 1000 {
            planner.plan_more(1).unwrap();
            calls += 1;
        }
        assert!(planner.is_solved());
        let path = planner.get_solution().unwrap().unwrap();
        assert!(path.len() >= 2);
        assert_eq!(path[0], vec![0.1, 0.1]);
        assert_eq!(path[path.len() - 1], vec![0.9, 0.9]);
        // get_path over the endpoint indices agrees on the endpoints.
        let direct = planner.get_path(0, 1).unwrap();
        assert_eq!(direct[0], vec![0.1, 0.1]);
        assert_eq!(direct[direct.len() - 1], vec![0.9, 0.9]);
    }

    #[test]
    fn test_goal_set_planning() {
        let mut planner = make_planner("prm");
        planner
            .set_endpoint_set(
                &vec![0.1, 0.1],
                Box::new(|q: &[f64]| Ok(q[0] > 0.8 && q[1] > 0.8)),
                Some(Box::new(|| Ok(vec![0.9, 0.9]))),
            )
            .unwrap();
        planner.plan_more(500).unwrap();
        assert!(planner.is_solved());
        let path = planner.get_solution().unwrap().unwrap();
        assert_eq!(path[0], vec![0.1, 0.1]);
        let last = &path[path.len() - 1];
        assert!(last[0] > 0.8 && last[1] > 0.8);
    }

    #[test]
    fn test_shortcut_smoothing_shrinks_path() {
        let mut config = PlannerConfig::default();
        config.set_string("type", "rrt").unwrap();
        config.set_numeric("perturbationRadius", 0.1).unwrap();
        config.set_numeric("connectionThreshold", 0.15).unwrap();
        let mut planner = Planner::new(&config, make_free_square()).unwrap();
        planner
            .set_endpoints(&vec![0.1, 0.1], &vec![0.9, 0.9])
            .unwrap();
        let mut calls = 0;
        while !planner.is_solved() && calls < 3000 {
            planner.plan_more(1).unwrap();
            calls += 1;
        }
        assert!(planner.is_solved());
        let rough = planner.get_solution().unwrap().unwrap();
        planner.config.shortcut = true;
        let smooth = planner.get_solution().unwrap().unwrap();
        assert!(smooth.len() <= rough.len());
        // Free space: the smoothed path is the direct segment.
        assert_eq!(smooth.len(), 2);
    }

    #[test]
    fn test_stats_and_roadmap_exposed() {
        let mut planner = make_planner("prm");
        planner
            .set_endpoints(&vec![0.1, 0.1], &vec![0.9, 0.9])
            .unwrap();
        planner.plan_more(50).unwrap();
        let stats = planner.get_stats();
        assert_eq!(stats.get("planner").map(String::as_str), Some("prm"));
        assert!(stats.contains_key("milestones"));
        let (nodes, edges) = planner.get_roadmap();
        assert_eq!(nodes.len(), planner.num_milestones());
        for &(i, j) in &edges {
            assert!(i < j && j < nodes.len());
        }
        let tgf = planner.to_tgf();
        assert!(tgf.contains('#'));
    }

    #[test]
    fn test_restart_policy_resets_stagnant_run() {
        let mut config = PlannerConfig::default();
        config.set_string("type", "rrt").unwrap();
        config.set_numeric("perturbationRadius", 0.2).unwrap();
        config.set_numeric("restart", 1.0).unwrap();
        config
            .set_string("restartTermCond", r#"{"foundSolution":1,"maxIters":25}"#)
            .unwrap();
        // An unreachable goal keeps the run stagnant forever.
        let space = {
            let mut space = CSpace::new();
            let mut state = 123456789u64;
            space.set_sampler(Box::new(move || {
                let mut draw = || {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 11) as f64 / (1u64 << 53) as f64
                };
                Ok(vec![draw()])
            }));
            // Two islands; the planner starts in the left one.
            space.add_feasibility_test("islands", |q: &[f64]| {
                Ok(q[0] < 0.4 || q[0] > 0.99)
            });
            space.set_edge_resolution(0.01).unwrap();
            Rc::new(RefCell::new(space))
        };
        let mut planner = Planner::new(&config, space).unwrap();
        planner.set_endpoints(&vec![0.1], &vec![0.995]).unwrap();
        planner.plan_more(120).unwrap();
        assert!(!planner.is_solved());
        // The restart policy keeps the iteration counter below the bound.
        assert!(planner.num_iterations() <= 25);
        // Endpoints survive every restart.
        assert_eq!(planner.roadmap().node(0), Some(&vec![0.1]));
        assert_eq!(planner.roadmap().node(1), Some(&vec![0.995]));
    }
}
