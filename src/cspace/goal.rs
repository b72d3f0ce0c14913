//! Goal regions: a base space restricted by a membership predicate.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::Config;
use crate::error::{CallbackResult, Result};

use super::space::CSpace;

/// Host goal-membership predicate.
pub type GoalTestFn = Box<dyn FnMut(&[f64]) -> CallbackResult<bool>>;

/// Host goal sampler.
pub type GoalSampleFn = Box<dyn FnMut() -> CallbackResult<Config>>;

/// A goal region over a base configuration space.
///
/// Membership is decided by the host predicate; a configuration belongs to
/// the goal set iff it is feasible in the base space and the predicate
/// holds. Sampling uses the dedicated goal sampler when one is supplied and
/// otherwise draws from the base space, leaving membership rejection to the
/// caller's loop.
pub struct GoalSet {
    base: Rc<RefCell<CSpace>>,
    goal_test: GoalTestFn,
    goal_sample: Option<GoalSampleFn>,
}

impl GoalSet {
    pub fn new(
        base: Rc<RefCell<CSpace>>,
        goal_test: GoalTestFn,
        goal_sample: Option<GoalSampleFn>,
    ) -> Self {
        Self {
            base,
            goal_test,
            goal_sample,
        }
    }

    /// The wrapped base space.
    pub fn base(&self) -> &Rc<RefCell<CSpace>> {
        &self.base
    }

    /// Whether a dedicated goal sampler was supplied.
    pub fn has_sampler(&self) -> bool {
        self.goal_sample.is_some()
    }

    /// Draw a candidate goal configuration.
    pub fn sample(&mut self) -> Result<Config> {
        match self.goal_sample.as_mut() {
            Some(f) => Ok(f()?),
            None => self.base.borrow_mut().sample(),
        }
    }

    /// Test goal membership alone.
    pub fn is_goal(&mut self, q: &Config) -> Result<bool> {
        Ok((self.goal_test)(q)?)
    }

    /// Base feasibility AND goal membership.
    pub fn is_feasible(&mut self, q: &Config) -> Result<bool> {
        if !self.base.borrow_mut().is_feasible(q)? {
            return Ok(false);
        }
        self.is_goal(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_base() -> Rc<RefCell<CSpace>> {
        let mut space = CSpace::new();
        space.set_sampler(Box::new(|| Ok(vec![0.5])));
        space.add_feasibility_test("box", |q: &[f64]| Ok((0.0..=1.0).contains(&q[0])));
        Rc::new(RefCell::new(space))
    }

    #[test]
    fn test_membership_is_conjunction() {
        let mut goal = GoalSet::new(make_base(), Box::new(|q| Ok(q[0] > 0.9)), None);
        assert!(goal.is_feasible(&vec![0.95]).unwrap());
        // In the goal half-space but outside the base box.
        assert!(!goal.is_feasible(&vec![1.5]).unwrap());
        // Feasible in the base but not a goal.
        assert!(!goal.is_feasible(&vec![0.5]).unwrap());
    }

    #[test]
    fn test_sampler_fallback_uses_base() {
        let mut goal = GoalSet::new(make_base(), Box::new(|_| Ok(true)), None);
        assert_eq!(goal.sample().unwrap(), vec![0.5]);
    }

    #[test]
    fn test_dedicated_sampler_wins() {
        let mut goal = GoalSet::new(
            make_base(),
            Box::new(|q| Ok(q[0] > 0.9)),
            Some(Box::new(|| Ok(vec![0.95]))),
        );
        assert!(goal.has_sampler());
        assert_eq!(goal.sample().unwrap(), vec![0.95]);
    }
}
