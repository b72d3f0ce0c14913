//! The host-defined configuration space.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::{check_dims, euclidean_distance, lerp_config, Config};
use crate::edge::EdgePlanner;
use crate::error::{CallbackResult, PlanError, Result};

use super::constraint::{ConstraintSet, TestKind, Truthy};

/// Host sampler: draw a configuration from the space.
pub type SampleFn = Box<dyn FnMut() -> CallbackResult<Config>>;

/// Host neighborhood sampler: draw near `center` within `radius`.
pub type NeighborhoodSampleFn = Box<dyn FnMut(&[f64], f64) -> CallbackResult<Config>>;

/// Host metric.
pub type DistanceFn = Box<dyn FnMut(&[f64], &[f64]) -> CallbackResult<f64>>;

/// Host interpolator: `interpolate(a, b, u)` with `u` in [0, 1].
pub type InterpolateFn = Box<dyn FnMut(&[f64], &[f64], f64) -> CallbackResult<Config>>;

/// A configuration space defined through host callbacks.
///
/// The space owns a sampler, optional metric and interpolation overrides,
/// and the named constraint set that decides feasibility of points and
/// visibility of segments. Queries go through the constraint scheduler's
/// current test order; with `adaptive` enabled every predicate call is timed
/// and the order can be re-optimized from the observed cost and pass rate.
///
/// # Example
///
/// ```rust,ignore
/// use marga_plan::cspace::CSpace;
///
/// let mut space = CSpace::new();
/// space.set_sampler(Box::new(|| Ok(vec![0.5, 0.5])));
/// space.add_feasibility_test("box", |q: &[f64]| {
///     Ok(q.iter().all(|&x| (0.0..=1.0).contains(&x)))
/// });
/// assert!(space.is_feasible(&vec![0.2, 0.9]).unwrap());
/// ```
pub struct CSpace {
    sample: Option<SampleFn>,
    sample_neighborhood: Option<NeighborhoodSampleFn>,
    distance: Option<DistanceFn>,
    interpolate: Option<InterpolateFn>,
    pub(crate) constraints: ConstraintSet,
    edge_resolution: f64,
    properties: HashMap<String, String>,
    adaptive: bool,
    rng: StdRng,
}

impl Default for CSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl CSpace {
    pub fn new() -> Self {
        Self {
            sample: None,
            sample_neighborhood: None,
            distance: None,
            interpolate: None,
            constraints: ConstraintSet::new(),
            edge_resolution: 1e-3,
            properties: HashMap::new(),
            adaptive: false,
            rng: StdRng::seed_from_u64(0),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Callback registration
    // ─────────────────────────────────────────────────────────────────────

    pub fn set_sampler(&mut self, sampler: SampleFn) {
        self.sample = Some(sampler);
    }

    pub fn set_neighborhood_sampler(&mut self, sampler: NeighborhoodSampleFn) {
        self.sample_neighborhood = Some(sampler);
    }

    pub fn set_distance(&mut self, distance: DistanceFn) {
        self.distance = Some(distance);
    }

    pub fn set_interpolate(&mut self, interpolate: InterpolateFn) {
        self.interpolate = Some(interpolate);
    }

    /// Replace the whole constraint table with a single feasibility test.
    pub fn set_feasibility<F>(&mut self, pred: F)
    where
        F: FnMut(&[f64]) -> CallbackResult<bool> + 'static,
    {
        self.constraints.reset_to_single();
        self.constraints.add_feasibility("feasible", Box::new(pred));
    }

    /// Register or replace the named feasibility test.
    pub fn add_feasibility_test<F>(&mut self, name: &str, pred: F) -> usize
    where
        F: FnMut(&[f64]) -> CallbackResult<bool> + 'static,
    {
        self.constraints.add_feasibility(name, Box::new(pred))
    }

    /// Replace the whole constraint table with a single visibility test.
    pub fn set_visibility<F, T>(&mut self, mut pred: F)
    where
        F: FnMut(&[f64], &[f64]) -> CallbackResult<T> + 'static,
        T: Into<Truthy> + 'static,
    {
        self.constraints.reset_to_single();
        self.constraints.add_visibility(
            "feasible",
            Box::new(move |a: &[f64], b: &[f64]| pred(a, b).map(|t| t.into().as_bool())),
        );
    }

    /// Register or replace the named visibility test.
    ///
    /// The predicate may return a boolean or an integer flag.
    pub fn add_visibility_test<F, T>(&mut self, name: &str, mut pred: F) -> usize
    where
        F: FnMut(&[f64], &[f64]) -> CallbackResult<T> + 'static,
        T: Into<Truthy> + 'static,
    {
        self.constraints.add_visibility(
            name,
            Box::new(move |a: &[f64], b: &[f64]| pred(a, b).map(|t| t.into().as_bool())),
        )
    }

    /// Set the bisection resolution and revert to bisection edge checking.
    ///
    /// Any registered visibility predicates are dropped.
    pub fn set_edge_resolution(&mut self, eps: f64) -> Result<()> {
        if !(eps > 0.0) {
            return Err(PlanError::InvalidArgument(format!(
                "edge resolution must be positive, got {}",
                eps
            )));
        }
        self.constraints.clear_visibility();
        self.edge_resolution = eps;
        Ok(())
    }

    pub fn edge_resolution(&self) -> f64 {
        self.edge_resolution
    }

    /// Record that `name` should only be feasibility-tested after `prereq`.
    pub fn add_feasibility_dependency(&mut self, name: &str, prereq: &str) -> Result<()> {
        self.constraints
            .add_dependency(TestKind::Feasibility, name, prereq)
    }

    /// Record that `name` should only be visibility-tested after `prereq`.
    pub fn add_visibility_dependency(&mut self, name: &str, prereq: &str) -> Result<()> {
        self.constraints
            .add_dependency(TestKind::Visibility, name, prereq)
    }

    /// Seed the cost/probability prior of a feasibility test.
    pub fn set_feasibility_prior(
        &mut self,
        name: &str,
        cost: f64,
        probability: f64,
        strength: f64,
    ) -> Result<()> {
        self.constraints
            .set_prior(TestKind::Feasibility, name, cost, probability, strength)
    }

    /// Seed the cost/probability prior of a visibility test.
    pub fn set_visibility_prior(
        &mut self,
        name: &str,
        cost: f64,
        probability: f64,
        strength: f64,
    ) -> Result<()> {
        self.constraints
            .set_prior(TestKind::Visibility, name, cost, probability, strength)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Draw a configuration from the host sampler.
    pub fn sample(&mut self) -> Result<Config> {
        match self.sample.as_mut() {
            Some(f) => Ok(f()?),
            None => Err(PlanError::InvalidArgument(
                "no sampler registered".to_string(),
            )),
        }
    }

    /// Draw a configuration near `center`.
    ///
    /// Falls back to a per-coordinate uniform perturbation of `radius` when
    /// no host sampler is registered.
    pub fn sample_neighborhood(&mut self, center: &[f64], radius: f64) -> Result<Config> {
        match self.sample_neighborhood.as_mut() {
            Some(f) => Ok(f(center, radius)?),
            None => Ok(center
                .iter()
                .map(|&x| x + self.rng.gen_range(-radius..=radius))
                .collect()),
        }
    }

    /// Test all feasibility constraints on `q`, in the current query order.
    pub fn is_feasible(&mut self, q: &Config) -> Result<bool> {
        if !self.constraints.has_feasibility_tests() {
            return Err(PlanError::InvalidArgument(
                "no feasibility tests registered".to_string(),
            ));
        }
        let adaptive = self.adaptive;
        for index in self.constraints.query_order(TestKind::Feasibility) {
            if !self.constraints.eval_feasible(index, q, adaptive)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Test a single feasibility constraint by index.
    pub fn is_feasible_constraint(&mut self, q: &Config, index: usize) -> Result<bool> {
        let adaptive = self.adaptive;
        self.constraints.eval_feasible(index, q, adaptive)
    }

    /// Test a single feasibility constraint by name.
    pub fn test_feasibility(&mut self, name: &str, q: &Config) -> Result<bool> {
        let index = self.constraints.index_of(name)?;
        self.is_feasible_constraint(q, index)
    }

    /// Test visibility of the straight segment from `a` to `b`.
    pub fn is_visible(&mut self, a: &Config, b: &Config) -> Result<bool> {
        let planner = self.local_planner(a, b);
        planner.is_visible(self)
    }

    /// Test segment visibility against a single constraint by index.
    pub fn is_visible_constraint(&mut self, a: &Config, b: &Config, index: usize) -> Result<bool> {
        let planner = self.local_planner_constraint(a, b, index);
        planner.is_visible(self)
    }

    /// Test segment visibility against a single constraint by name.
    pub fn test_visibility(&mut self, name: &str, a: &Config, b: &Config) -> Result<bool> {
        let index = self.constraints.index_of(name)?;
        self.is_visible_constraint(a, b, index)
    }

    /// Build the edge planner for a segment.
    ///
    /// Bisection at the configured resolution when no visibility predicates
    /// exist, otherwise delegation to the per-constraint predicates.
    pub fn local_planner(&self, a: &Config, b: &Config) -> EdgePlanner {
        if self.constraints.has_visibility_tests() {
            EdgePlanner::callback(a.clone(), b.clone(), None)
        } else {
            EdgePlanner::bisection(a.clone(), b.clone(), None, self.edge_resolution)
        }
    }

    /// Build the edge planner for a segment, restricted to one constraint.
    pub fn local_planner_constraint(&self, a: &Config, b: &Config, index: usize) -> EdgePlanner {
        if self.constraints.has_visibility_tests() {
            EdgePlanner::callback(a.clone(), b.clone(), Some(index))
        } else {
            EdgePlanner::bisection(a.clone(), b.clone(), Some(index), self.edge_resolution)
        }
    }

    /// Distance between two configurations (host metric or Euclidean).
    pub fn distance(&mut self, x: &[f64], y: &[f64]) -> Result<f64> {
        match self.distance.as_mut() {
            Some(f) => Ok(f(x, y)?),
            None => {
                check_dims(x, y)?;
                Ok(euclidean_distance(x, y))
            }
        }
    }

    /// Interpolate between two configurations (host rule or per-coordinate).
    pub fn interpolate(&mut self, x: &[f64], y: &[f64], u: f64) -> Result<Config> {
        match self.interpolate.as_mut() {
            Some(f) => Ok(f(x, y, u)?),
            None => {
                check_dims(x, y)?;
                Ok(lerp_config(x, y, u))
            }
        }
    }

    /// Names of all feasibility constraints failing at `q`.
    pub fn infeasible_constraints(&mut self, q: &Config) -> Result<Vec<String>> {
        let mut failing = Vec::new();
        for index in 0..self.constraints.len() {
            if !self.is_feasible_constraint(q, index)? {
                if let Some(name) = self.constraints.name(index) {
                    failing.push(name.to_string());
                }
            }
        }
        Ok(failing)
    }

    /// Names of all visibility constraints failing on the segment `(a, b)`.
    pub fn invisible_constraints(&mut self, a: &Config, b: &Config) -> Result<Vec<String>> {
        let mut failing = Vec::new();
        for index in 0..self.constraints.len() {
            if !self.is_visible_constraint(a, b, index)? {
                if let Some(name) = self.constraints.name(index) {
                    failing.push(name.to_string());
                }
            }
        }
        Ok(failing)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Properties and adaptive ordering
    // ─────────────────────────────────────────────────────────────────────

    /// The property map, with metric hints filled in for the defaults.
    pub fn properties(&self) -> HashMap<String, String> {
        let mut props = self.properties.clone();
        if self.distance.is_none() {
            props.insert("euclidean".to_string(), "1".to_string());
            props.insert("metric".to_string(), "euclidean".to_string());
            if self.interpolate.is_none() {
                props.insert("geodesic".to_string(), "1".to_string());
            }
        }
        props
    }

    pub fn set_property(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_string(), value.to_string());
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Whether adaptive query ordering is enabled.
    pub fn adaptive(&self) -> bool {
        self.adaptive
    }

    pub fn set_adaptive(&mut self, enabled: bool) {
        self.adaptive = enabled;
    }

    /// Reseed the engine-side randomness of this space.
    pub fn set_random_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Recompute both test orders from the accumulated stats.
    ///
    /// No-op unless adaptive ordering is enabled.
    pub fn optimize_query_order(&mut self) {
        if !self.adaptive {
            return;
        }
        self.constraints.optimize_orders();
    }

    /// Feasibility test order as constraint names.
    pub fn feasibility_query_order(&self) -> Vec<String> {
        self.constraints.query_order_names(TestKind::Feasibility)
    }

    /// Visibility test order as constraint names.
    pub fn visibility_query_order(&self) -> Vec<String> {
        self.constraints.query_order_names(TestKind::Visibility)
    }

    /// Expected cost of one evaluation of a feasibility test.
    pub fn feasibility_cost(&self, name: &str) -> Result<f64> {
        Ok(self.constraints.stats(TestKind::Feasibility, name)?.cost)
    }

    /// Observed pass rate of a feasibility test.
    pub fn feasibility_probability(&self, name: &str) -> Result<f64> {
        Ok(self
            .constraints
            .stats(TestKind::Feasibility, name)?
            .probability)
    }

    /// Expected cost of one evaluation of a visibility test.
    pub fn visibility_cost(&self, name: &str) -> Result<f64> {
        Ok(self.constraints.stats(TestKind::Visibility, name)?.cost)
    }

    /// Observed pass rate of a visibility test.
    pub fn visibility_probability(&self, name: &str) -> Result<f64> {
        Ok(self
            .constraints
            .stats(TestKind::Visibility, name)?
            .probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_unit_box(dim: usize) -> CSpace {
        let mut space = CSpace::new();
        space.set_sampler(Box::new(move || Ok(vec![0.5; dim])));
        space.add_feasibility_test("box", |q: &[f64]| {
            Ok(q.iter().all(|&x| (0.0..=1.0).contains(&x)))
        });
        space
    }

    #[test]
    fn test_default_distance_is_euclidean() {
        let mut space = make_unit_box(2);
        let d = space.distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_interpolate_endpoints() {
        let mut space = make_unit_box(2);
        assert_eq!(
            space.interpolate(&[0.1, 0.2], &[0.9, 0.8], 0.0).unwrap(),
            vec![0.1, 0.2]
        );
        assert_eq!(
            space.interpolate(&[0.1, 0.2], &[0.9, 0.8], 1.0).unwrap(),
            vec![0.9, 0.8]
        );
    }

    #[test]
    fn test_custom_distance_used() {
        let mut space = make_unit_box(1);
        space.set_distance(Box::new(|x, y| Ok((x[0] - y[0]).abs() * 10.0)));
        let d = space.distance(&[0.0], &[1.0]).unwrap();
        assert!((d - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_feasibility_is_conjunction() {
        let mut space = make_unit_box(1);
        space.add_feasibility_test("positive", |q: &[f64]| Ok(q[0] > 0.0));
        assert!(space.is_feasible(&vec![0.5]).unwrap());
        assert!(!space.is_feasible(&vec![-0.5]).unwrap());
        assert!(!space.is_feasible(&vec![1.5]).unwrap());
    }

    #[test]
    fn test_callback_error_propagates() {
        let mut space = CSpace::new();
        space.add_feasibility_test("broken", |_: &[f64]| {
            Err(crate::CallbackError::new("sensor offline"))
        });
        let err = space.is_feasible(&vec![0.0]).unwrap_err();
        match err {
            PlanError::Callback(msg) => assert!(msg.contains("sensor offline")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_properties_defaults() {
        let space = make_unit_box(2);
        let props = space.properties();
        assert_eq!(props.get("euclidean").map(String::as_str), Some("1"));
        assert_eq!(props.get("geodesic").map(String::as_str), Some("1"));

        let mut space = make_unit_box(2);
        space.set_interpolate(Box::new(|a, b, u| Ok(lerp_config(a, b, u))));
        let props = space.properties();
        assert_eq!(props.get("euclidean").map(String::as_str), Some("1"));
        assert!(!props.contains_key("geodesic"));
    }

    #[test]
    fn test_negative_edge_resolution_rejected() {
        let mut space = make_unit_box(1);
        assert!(space.set_edge_resolution(-0.1).is_err());
        assert!(space.set_edge_resolution(0.0).is_err());
        assert!(space.set_edge_resolution(0.01).is_ok());
    }

    #[test]
    fn test_adaptive_flag_reported() {
        let mut space = make_unit_box(1);
        assert!(!space.adaptive());
        space.set_adaptive(true);
        assert!(space.adaptive());
    }

    #[test]
    fn test_adaptive_reorder_puts_selective_test_first() {
        let mut space = CSpace::new();
        // A is cheap and rejects 90% of samples, B is expensive and always
        // passes; after optimization A must come first.
        space.add_feasibility_test("B", |_: &[f64]| Ok(true));
        space.add_feasibility_test("A", |q: &[f64]| Ok(q[0] < 0.1));
        space.set_adaptive(true);
        space
            .set_feasibility_prior("A", 1e-6, 0.1, 100.0)
            .unwrap();
        space.set_feasibility_prior("B", 1e-3, 1.0, 100.0).unwrap();
        space.optimize_query_order();
        let order = space.feasibility_query_order();
        assert_eq!(order[0], "A");
        assert_eq!(order[1], "B");
    }

    #[test]
    fn test_infeasible_constraint_names(){
        let mut space = make_unit_box(1);
        space.add_feasibility_test("positive", |q: &[f64]| Ok(q[0] > 0.0));
        let failing = space.infeasible_constraints(&vec![-0.5]).unwrap();
        assert_eq!(failing, vec!["box".to_string(), "positive".to_string()]);
        let failing = space.infeasible_constraints(&vec![0.5]).unwrap();
        assert!(failing.is_empty());
    }

    #[test]
    fn test_sample_neighborhood_fallback_stays_in_radius() {
        let mut space = make_unit_box(2);
        let center = vec![0.5, 0.5];
        for _ in 0..32 {
            let q = space.sample_neighborhood(&center, 0.1).unwrap();
            for (x, c) in q.iter().zip(center.iter()) {
                assert!((x - c).abs() <= 0.1 + 1e-12);
            }
        }
    }
}
