//! Edge planners: visibility checking for straight C-space segments.
//!
//! Two strategies, chosen by the space when the planner is built:
//!
//! - **Bisection**: no visibility predicates exist, so the segment is
//!   recursively bisected and each midpoint feasibility-checked, densest
//!   midpoints first, until sub-segments fall below the edge resolution.
//! - **Callback**: the host registered per-constraint visibility predicates;
//!   each is called on the segment endpoints in the current query order with
//!   short-circuit on the first failure.

use std::collections::VecDeque;

use crate::core::Config;
use crate::cspace::{CSpace, TestKind};
use crate::error::Result;

/// A visibility decision procedure for one segment.
///
/// The planner captures the segment (and optionally a single constraint to
/// test against); the space it runs in is passed per call so statistics and
/// host callbacks stay with the space.
#[derive(Debug, Clone)]
pub enum EdgePlanner {
    /// Straight-line bisection at a fixed resolution.
    Bisection {
        a: Config,
        b: Config,
        /// Restrict checks to one constraint index, or test all.
        constraint: Option<usize>,
        resolution: f64,
    },
    /// Delegation to per-constraint visibility predicates.
    Callback {
        a: Config,
        b: Config,
        constraint: Option<usize>,
    },
}

impl EdgePlanner {
    pub fn bisection(a: Config, b: Config, constraint: Option<usize>, resolution: f64) -> Self {
        EdgePlanner::Bisection {
            a,
            b,
            constraint,
            resolution,
        }
    }

    pub fn callback(a: Config, b: Config, constraint: Option<usize>) -> Self {
        EdgePlanner::Callback { a, b, constraint }
    }

    /// Segment start.
    pub fn start(&self) -> &Config {
        match self {
            EdgePlanner::Bisection { a, .. } | EdgePlanner::Callback { a, .. } => a,
        }
    }

    /// Segment end.
    pub fn goal(&self) -> &Config {
        match self {
            EdgePlanner::Bisection { b, .. } | EdgePlanner::Callback { b, .. } => b,
        }
    }

    /// The same check over the reversed segment.
    pub fn reverse(&self) -> EdgePlanner {
        match self {
            EdgePlanner::Bisection {
                a,
                b,
                constraint,
                resolution,
            } => EdgePlanner::Bisection {
                a: b.clone(),
                b: a.clone(),
                constraint: *constraint,
                resolution: *resolution,
            },
            EdgePlanner::Callback { a, b, constraint } => EdgePlanner::Callback {
                a: b.clone(),
                b: a.clone(),
                constraint: *constraint,
            },
        }
    }

    /// Point at parameter `u` along the segment.
    pub fn eval(&self, space: &mut CSpace, u: f64) -> Result<Config> {
        space.interpolate(self.start(), self.goal(), u)
    }

    /// Decide visibility of the segment.
    pub fn is_visible(&self, space: &mut CSpace) -> Result<bool> {
        match self {
            EdgePlanner::Bisection {
                a,
                b,
                constraint,
                resolution,
            } => bisection_visible(space, a, b, *constraint, *resolution),
            EdgePlanner::Callback { a, b, constraint } => {
                callback_visible(space, a, b, *constraint)
            }
        }
    }
}

/// Bisection check: breadth-first over sub-segments so the whole segment's
/// midpoint is tested before any quarter point. Endpoints themselves are
/// assumed feasible; callers validate them when inserting milestones.
fn bisection_visible(
    space: &mut CSpace,
    a: &Config,
    b: &Config,
    constraint: Option<usize>,
    resolution: f64,
) -> Result<bool> {
    let mut queue: VecDeque<(Config, Config)> = VecDeque::new();
    queue.push_back((a.clone(), b.clone()));
    while let Some((p, q)) = queue.pop_front() {
        if space.distance(&p, &q)? <= resolution {
            continue;
        }
        let mid = space.interpolate(&p, &q, 0.5)?;
        let feasible = match constraint {
            Some(k) => space.is_feasible_constraint(&mid, k)?,
            None => space.is_feasible(&mid)?,
        };
        if !feasible {
            return Ok(false);
        }
        queue.push_back((p, mid.clone()));
        queue.push_back((mid, q));
    }
    Ok(true)
}

/// Callback check: per-constraint predicates, short-circuiting in the
/// current visibility query order.
fn callback_visible(
    space: &mut CSpace,
    a: &Config,
    b: &Config,
    constraint: Option<usize>,
) -> Result<bool> {
    let adaptive = space.adaptive();
    match constraint {
        Some(k) => space.constraints.eval_visible(k, a, b, adaptive),
        None => {
            for index in space.constraints.query_order(TestKind::Visibility) {
                if !space.constraints.eval_visible(index, a, b, adaptive)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_gap_space(eps: f64) -> CSpace {
        let mut space = CSpace::new();
        space.set_sampler(Box::new(|| Ok(vec![0.5])));
        space.add_feasibility_test("gap", |q: &[f64]| Ok(!(0.4..=0.6).contains(&q[0])));
        space.set_edge_resolution(eps).unwrap();
        space
    }

    #[test]
    fn test_bisection_detects_gap() {
        let mut space = make_gap_space(0.01);
        assert!(!space.is_visible(&vec![0.0], &vec![1.0]).unwrap());
    }

    #[test]
    fn test_bisection_passes_clear_segment() {
        let mut space = make_gap_space(0.01);
        assert!(space.is_visible(&vec![0.0], &vec![0.3]).unwrap());
        assert!(space.is_visible(&vec![0.7], &vec![1.0]).unwrap());
    }

    #[test]
    fn test_coarse_resolution_misses_thin_obstacle() {
        // The infeasible band is 0.2 wide; a resolution coarser than the
        // whole segment stops after zero midpoint checks.
        let mut space = make_gap_space(2.0);
        assert!(space.is_visible(&vec![0.0], &vec![1.0]).unwrap());
    }

    #[test]
    fn test_callback_planner_used_when_predicates_exist() {
        let mut space = make_gap_space(0.01);
        space.add_visibility_test("gap", |a: &[f64], b: &[f64]| {
            Ok(a[0].max(b[0]) < 0.4 || a[0].min(b[0]) > 0.6)
        });
        assert!(matches!(
            space.local_planner(&vec![0.0], &vec![0.3]),
            EdgePlanner::Callback { .. }
        ));
        assert!(space.is_visible(&vec![0.0], &vec![0.3]).unwrap());
        assert!(!space.is_visible(&vec![0.0], &vec![1.0]).unwrap());
    }

    #[test]
    fn test_callback_receives_distinct_endpoints() {
        let mut space = CSpace::new();
        space.add_visibility_test("check", |a: &[f64], b: &[f64]| {
            assert_ne!(a[0], b[0], "predicate must see both endpoints");
            Ok(true)
        });
        assert!(space.is_visible(&vec![0.0], &vec![1.0]).unwrap());
    }

    #[test]
    fn test_integer_truthiness_accepted() {
        let mut space = CSpace::new();
        space.add_visibility_test("int", |a: &[f64], b: &[f64]| {
            Ok(if a[0] < b[0] { 1 } else { 0 })
        });
        assert!(space.is_visible(&vec![0.0], &vec![1.0]).unwrap());
        assert!(!space.is_visible(&vec![1.0], &vec![0.0]).unwrap());
    }

    #[test]
    fn test_single_constraint_bisection() {
        let mut space = make_gap_space(0.01);
        space.add_feasibility_test("positive", |q: &[f64]| Ok(q[0] > -0.5));
        // Against "positive" alone the gap does not exist.
        assert!(space
            .is_visible_constraint(&vec![0.0], &vec![1.0], 1)
            .unwrap());
        assert!(!space
            .is_visible_constraint(&vec![0.0], &vec![1.0], 0)
            .unwrap());
    }

    #[test]
    fn test_reverse_swaps_endpoints() {
        let planner = EdgePlanner::bisection(vec![0.0], vec![1.0], None, 0.1);
        let rev = planner.reverse();
        assert_eq!(rev.start(), &vec![1.0]);
        assert_eq!(rev.goal(), &vec![0.0]);
    }

    #[test]
    fn test_eval_interpolates() {
        let mut space = make_gap_space(0.01);
        let planner = space.local_planner(&vec![0.0], &vec![1.0]);
        let mid = planner.eval(&mut space, 0.5).unwrap();
        assert!((mid[0] - 0.5).abs() < 1e-12);
    }
}
