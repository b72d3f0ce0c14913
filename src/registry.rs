//! Integer-handle tables for spaces and planners.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::PlannerConfig;
use crate::cspace::CSpace;
use crate::error::{PlanError, Result};
use crate::planning::Planner;

/// Slot tables exposing spaces and planners as small integer handles.
///
/// Slots are allocated from a free list: destroying a handle nulls its slot
/// and queues the index for reuse. Any operation through an out-of-range or
/// freed handle fails. The registry also owns the engine's seedable
/// randomness; planners created through it draw their streams from the
/// registry RNG.
pub struct Registry {
    spaces: Vec<Option<Rc<RefCell<CSpace>>>>,
    space_free: VecDeque<usize>,
    planners: Vec<Option<Planner>>,
    planner_free: VecDeque<usize>,
    rng: StdRng,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            spaces: Vec::new(),
            space_free: VecDeque::new(),
            planners: Vec::new(),
            planner_free: VecDeque::new(),
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Seed the engine PRNG deterministically.
    ///
    /// Affects planners created afterwards and the default neighborhood
    /// sampling of spaces created afterwards.
    pub fn set_random_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Allocate a fresh configuration space, returning its handle.
    pub fn make_cspace(&mut self) -> usize {
        let mut space = CSpace::new();
        space.set_random_seed(self.rng.gen());
        let slot = Rc::new(RefCell::new(space));
        match self.space_free.pop_front() {
            Some(index) => {
                self.spaces[index] = Some(slot);
                index
            }
            None => {
                self.spaces.push(Some(slot));
                self.spaces.len() - 1
            }
        }
    }

    /// Look up a space by handle.
    pub fn cspace(&self, handle: usize) -> Result<Rc<RefCell<CSpace>>> {
        self.spaces
            .get(handle)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or_else(|| PlanError::InvalidHandle(format!("cspace {handle}")))
    }

    /// Free a space slot.
    ///
    /// Destroying a space still referenced by a live planner is a usage
    /// error; the planner keeps its shared reference but the handle is gone.
    pub fn destroy_cspace(&mut self, handle: usize) -> Result<()> {
        let slot = self
            .spaces
            .get_mut(handle)
            .ok_or_else(|| PlanError::InvalidHandle(format!("cspace {handle}")))?;
        if slot.take().is_none() {
            return Err(PlanError::InvalidHandle(format!("cspace {handle}")));
        }
        self.space_free.push_back(handle);
        Ok(())
    }

    /// Create a planner bound to the space behind `space_handle`.
    pub fn make_planner(&mut self, config: &PlannerConfig, space_handle: usize) -> Result<usize> {
        let space = self.cspace(space_handle)?;
        let rng = StdRng::seed_from_u64(self.rng.gen());
        let planner = Planner::with_rng(config, space, rng)?;
        Ok(match self.planner_free.pop_front() {
            Some(index) => {
                self.planners[index] = Some(planner);
                index
            }
            None => {
                self.planners.push(Some(planner));
                self.planners.len() - 1
            }
        })
    }

    /// Look up a planner by handle.
    pub fn planner(&mut self, handle: usize) -> Result<&mut Planner> {
        self.planners
            .get_mut(handle)
            .and_then(Option::as_mut)
            .ok_or_else(|| PlanError::InvalidHandle(format!("planner {handle}")))
    }

    /// Free a planner slot.
    pub fn destroy_planner(&mut self, handle: usize) -> Result<()> {
        let slot = self
            .planners
            .get_mut(handle)
            .ok_or_else(|| PlanError::InvalidHandle(format!("planner {handle}")))?;
        if slot.take().is_none() {
            return Err(PlanError::InvalidHandle(format!("planner {handle}")));
        }
        self.planner_free.push_back(handle);
        Ok(())
    }

    /// Drop every table entry and free list.
    pub fn destroy_all(&mut self) {
        self.spaces.clear();
        self.space_free.clear();
        self.planners.clear();
        self.planner_free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_dense_and_reused() {
        let mut registry = Registry::new();
        let a = registry.make_cspace();
        let b = registry.make_cspace();
        assert_eq!((a, b), (0, 1));
        registry.destroy_cspace(a).unwrap();
        // Freed slot is recycled first.
        assert_eq!(registry.make_cspace(), 0);
        assert_eq!(registry.make_cspace(), 2);
    }

    #[test]
    fn test_freed_handle_is_invalid() {
        let mut registry = Registry::new();
        let h = registry.make_cspace();
        registry.destroy_cspace(h).unwrap();
        assert!(matches!(
            registry.cspace(h),
            Err(PlanError::InvalidHandle(_))
        ));
        assert!(registry.destroy_cspace(h).is_err());
    }

    #[test]
    fn test_out_of_range_handle_is_invalid() {
        let mut registry = Registry::new();
        assert!(registry.cspace(3).is_err());
        assert!(registry.planner(0).is_err());
        assert!(registry.destroy_planner(9).is_err());
    }

    #[test]
    fn test_planner_creation_checks_space_handle() {
        let mut registry = Registry::new();
        let config = PlannerConfig::default();
        assert!(registry.make_planner(&config, 0).is_err());
        let h = registry.make_cspace();
        let p = registry.make_planner(&config, h).unwrap();
        assert!(registry.planner(p).is_ok());
    }

    #[test]
    fn test_destroy_all() {
        let mut registry = Registry::new();
        let s = registry.make_cspace();
        let p = registry.make_planner(&PlannerConfig::default(), s).unwrap();
        registry.destroy_all();
        assert!(registry.cspace(s).is_err());
        assert!(registry.planner(p).is_err());
        // Allocation starts from index 0 again.
        assert_eq!(registry.make_cspace(), 0);
    }

    #[test]
    fn test_seeded_planners_are_deterministic() {
        let run = |seed: u64| {
            let mut registry = Registry::new();
            registry.set_random_seed(seed);
            let s = registry.make_cspace();
            {
                let space = registry.cspace(s).unwrap();
                let mut space = space.borrow_mut();
                let mut state = 42u64;
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
            }
            let mut config = PlannerConfig::default();
            config.set_numeric("knn", 5.0).unwrap();
            config.set_numeric("connectionThreshold", 0.3).unwrap();
            let p = registry.make_planner(&config, s).unwrap();
            let planner = registry.planner(p).unwrap();
            planner
                .set_endpoints(&vec![0.1, 0.1], &vec![0.9, 0.9])
                .unwrap();
            planner.plan_more(100).unwrap();
            planner.get_stats()
        };
        assert_eq!(run(7), run(7));
    }
}
