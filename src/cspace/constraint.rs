//! Named constraint table shared by feasibility and visibility tests.

use std::collections::HashMap;
use std::time::Instant;

use crate::core::Config;
use crate::error::{CallbackResult, PlanError, Result};

use super::order::optimize_testing_order;
use super::stats::TesterStats;

/// Feasibility predicate over a single configuration.
pub type FeasiblePredicate = Box<dyn FnMut(&[f64]) -> CallbackResult<bool>>;

/// Visibility predicate over a pair of configurations.
pub type VisiblePredicate = Box<dyn FnMut(&[f64], &[f64]) -> CallbackResult<bool>>;

/// Truth value accepted from host visibility predicates.
///
/// Hosts hand back either plain booleans or integer flags; any nonzero
/// integer counts as visible.
#[derive(Clone, Copy, Debug)]
pub enum Truthy {
    Bool(bool),
    Int(i64),
}

impl Truthy {
    #[inline]
    pub fn as_bool(self) -> bool {
        match self {
            Truthy::Bool(b) => b,
            Truthy::Int(i) => i != 0,
        }
    }
}

impl From<bool> for Truthy {
    fn from(b: bool) -> Self {
        Truthy::Bool(b)
    }
}

impl From<i64> for Truthy {
    fn from(i: i64) -> Self {
        Truthy::Int(i)
    }
}

impl From<i32> for Truthy {
    fn from(i: i32) -> Self {
        Truthy::Int(i as i64)
    }
}

/// Which predicate slot of a constraint a query exercises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestKind {
    Feasibility,
    Visibility,
}

impl TestKind {
    fn label(self) -> &'static str {
        match self {
            TestKind::Feasibility => "feasibility",
            TestKind::Visibility => "visibility",
        }
    }
}

/// The named constraint set of a configuration space.
///
/// Feasibility and visibility tests share one name → index map: registering
/// a visibility test under an already-known name reuses that name's index.
/// Indices are dense, assigned at first registration, and never renumbered.
/// Either predicate slot of a constraint may be absent; querying an absent
/// slot is an error.
#[derive(Default)]
pub struct ConstraintSet {
    names: Vec<String>,
    index_by_name: HashMap<String, usize>,
    feasible: Vec<Option<FeasiblePredicate>>,
    visible: Vec<Option<VisiblePredicate>>,
    pub(crate) feasible_stats: Vec<TesterStats>,
    pub(crate) visible_stats: Vec<TesterStats>,
    feasible_deps: Vec<Vec<usize>>,
    visible_deps: Vec<Vec<usize>>,
    feasible_order: Vec<usize>,
    visible_order: Vec<usize>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered constraint names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the constraint at `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Index of the constraint named `name`.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.index_by_name
            .get(name)
            .copied()
            .ok_or_else(|| PlanError::UnknownConstraint(name.to_string()))
    }

    /// True if any feasibility predicate is registered.
    pub fn has_feasibility_tests(&self) -> bool {
        self.feasible.iter().any(Option::is_some)
    }

    /// True if any visibility predicate is registered.
    pub fn has_visibility_tests(&self) -> bool {
        self.visible.iter().any(Option::is_some)
    }

    /// Get-or-create the index for `name`, growing all parallel tables.
    fn register(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index_by_name.get(name) {
            return i;
        }
        let i = self.names.len();
        self.names.push(name.to_string());
        self.index_by_name.insert(name.to_string(), i);
        self.feasible.push(None);
        self.visible.push(None);
        self.feasible_stats.push(TesterStats::new());
        self.visible_stats.push(TesterStats::new());
        self.feasible_deps.push(Vec::new());
        self.visible_deps.push(Vec::new());
        i
    }

    /// Register or replace the feasibility predicate for `name`.
    ///
    /// A replaced slot resets its stats. A newly registered name invalidates
    /// the current feasibility test order until the next optimization.
    pub fn add_feasibility(&mut self, name: &str, pred: FeasiblePredicate) -> usize {
        let fresh = !self.index_by_name.contains_key(name);
        let i = self.register(name);
        if self.feasible[i].is_some() {
            self.feasible_stats[i].reset(0.0, 0.0, 0.0);
        }
        self.feasible[i] = Some(pred);
        if fresh {
            self.feasible_order.clear();
        }
        i
    }

    /// Register or replace the visibility predicate for `name`.
    pub fn add_visibility(&mut self, name: &str, pred: VisiblePredicate) -> usize {
        let fresh = !self.index_by_name.contains_key(name);
        let i = self.register(name);
        if self.visible[i].is_some() {
            self.visible_stats[i].reset(0.0, 0.0, 0.0);
        }
        self.visible[i] = Some(pred);
        if fresh {
            self.visible_order.clear();
        }
        i
    }

    /// Reset the table to the single constraint `"feasible"`.
    ///
    /// Used by the whole-space predicate setters. If the table already holds
    /// exactly that one constraint, it is kept (so setting feasibility and
    /// visibility in either order composes onto one slot).
    pub(crate) fn reset_to_single(&mut self) -> usize {
        if self.names.len() == 1 && self.names[0] == "feasible" {
            return 0;
        }
        if !self.names.is_empty() {
            log::debug!(
                "replacing {} named constraints with single 'feasible' constraint",
                self.names.len()
            );
        }
        *self = ConstraintSet::new();
        self.register("feasible")
    }

    /// Drop every visibility predicate, its stats and its order.
    ///
    /// Reverts visibility checking to straight-line bisection.
    pub(crate) fn clear_visibility(&mut self) {
        for slot in &mut self.visible {
            *slot = None;
        }
        for s in &mut self.visible_stats {
            s.reset(0.0, 0.0, 0.0);
        }
        self.visible_order.clear();
    }

    /// Record that `name` should only be tested after `prereq` passed.
    pub fn add_dependency(&mut self, kind: TestKind, name: &str, prereq: &str) -> Result<()> {
        let cindex = self.index_of(name)?;
        let dindex = self.index_of(prereq)?;
        match kind {
            TestKind::Feasibility => self.feasible_deps[cindex].push(dindex),
            TestKind::Visibility => self.visible_deps[cindex].push(dindex),
        }
        Ok(())
    }

    /// Seed the stats prior for one constraint.
    pub fn set_prior(
        &mut self,
        kind: TestKind,
        name: &str,
        cost: f64,
        probability: f64,
        strength: f64,
    ) -> Result<()> {
        let i = self.index_of(name)?;
        match kind {
            TestKind::Feasibility => self.feasible_stats[i].reset(cost, probability, strength),
            TestKind::Visibility => self.visible_stats[i].reset(cost, probability, strength),
        }
        Ok(())
    }

    /// Current stats for one constraint.
    pub fn stats(&self, kind: TestKind, name: &str) -> Result<TesterStats> {
        let i = self.index_of(name)?;
        Ok(match kind {
            TestKind::Feasibility => self.feasible_stats[i],
            TestKind::Visibility => self.visible_stats[i],
        })
    }

    /// The constraint indices in current query order.
    ///
    /// An optimized order is used only when it covers every constraint;
    /// otherwise (never optimized, or stale after a registration) the
    /// insertion order applies.
    pub fn query_order(&self, kind: TestKind) -> Vec<usize> {
        let order = match kind {
            TestKind::Feasibility => &self.feasible_order,
            TestKind::Visibility => &self.visible_order,
        };
        if order.len() == self.names.len() {
            order.clone()
        } else {
            (0..self.names.len()).collect()
        }
    }

    /// The query order as constraint names.
    pub fn query_order_names(&self, kind: TestKind) -> Vec<String> {
        self.query_order(kind)
            .into_iter()
            .map(|i| self.names[i].clone())
            .collect()
    }

    /// Recompute both query orders from the accumulated stats.
    pub fn optimize_orders(&mut self) {
        self.feasible_order = optimize_testing_order(&self.feasible_stats, &self.feasible_deps);
        self.visible_order = optimize_testing_order(&self.visible_stats, &self.visible_deps);
    }

    /// Evaluate the feasibility predicate of constraint `index` on `q`.
    ///
    /// With `adaptive` the call is timed and folded into the constraint's
    /// stats.
    pub fn eval_feasible(&mut self, index: usize, q: &Config, adaptive: bool) -> Result<bool> {
        if index >= self.names.len() {
            return Err(PlanError::InvalidArgument(format!(
                "constraint index {} out of range",
                index
            )));
        }
        let pred = match self.feasible[index].as_mut() {
            Some(p) => p,
            None => {
                return Err(PlanError::MissingPredicate {
                    kind: TestKind::Feasibility.label(),
                    name: self.names[index].clone(),
                })
            }
        };
        if adaptive {
            let start = Instant::now();
            let res = pred(q)?;
            self.feasible_stats[index].update(start.elapsed().as_secs_f64(), res, 1.0);
            Ok(res)
        } else {
            Ok(pred(q)?)
        }
    }

    /// Evaluate the visibility predicate of constraint `index` on `(a, b)`.
    pub fn eval_visible(
        &mut self,
        index: usize,
        a: &Config,
        b: &Config,
        adaptive: bool,
    ) -> Result<bool> {
        if index >= self.names.len() {
            return Err(PlanError::InvalidArgument(format!(
                "constraint index {} out of range",
                index
            )));
        }
        let pred = match self.visible[index].as_mut() {
            Some(p) => p,
            None => {
                return Err(PlanError::MissingPredicate {
                    kind: TestKind::Visibility.label(),
                    name: self.names[index].clone(),
                })
            }
        };
        if adaptive {
            let start = Instant::now();
            let res = pred(a, b)?;
            self.visible_stats[index].update(start.elapsed().as_secs_f64(), res, 1.0);
            Ok(res)
        } else {
            Ok(pred(a, b)?)
        }
    }
}
