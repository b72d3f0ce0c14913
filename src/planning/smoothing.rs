//! Solution path post-processing.

use crate::core::Config;
use crate::cspace::CSpace;
use crate::error::Result;

/// Shortcut-smooth a milestone path.
///
/// Greedily replaces waypoint runs with direct segments: from each kept
/// waypoint, the furthest later waypoint with a visible connection becomes
/// the next one. Endpoints are preserved; the result is never longer than
/// the input in waypoint count.
pub fn shortcut_path(space: &mut CSpace, path: &[Config]) -> Result<Vec<Config>> {
    if path.len() <= 2 {
        return Ok(path.to_vec());
    }

    let mut smoothed = vec![path[0].clone()];
    let mut i = 0;
    while i < path.len() - 1 {
        let mut furthest = i + 1;
        for j in (i + 2)..path.len() {
            if space.is_visible(&path[i], &path[j])? {
                furthest = j;
            }
        }
        smoothed.push(path[furthest].clone());
        i = furthest;
    }
    Ok(smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_gap_space() -> CSpace {
        let mut space = CSpace::new();
        space.add_feasibility_test("gap", |q: &[f64]| Ok(!(0.4..=0.6).contains(&q[0])));
        space.set_edge_resolution(0.01).unwrap();
        space
    }

    #[test]
    fn test_collinear_waypoints_collapse() {
        let mut space = CSpace::new();
        space.add_feasibility_test("free", |_: &[f64]| Ok(true));
        space.set_edge_resolution(0.01).unwrap();
        let path: Vec<Config> = (0..=10).map(|i| vec![i as f64 * 0.1]).collect();
        let smoothed = shortcut_path(&mut space, &path).unwrap();
        assert_eq!(smoothed, vec![vec![0.0], vec![1.0]]);
    }

    #[test]
    fn test_blocked_shortcut_keeps_detour() {
        // The detour over the wall cannot be cut to a straight segment
        // through it.
        let mut space = CSpace::new();
        space.add_feasibility_test("wall", |q: &[f64]| {
            Ok(!((0.4..=0.6).contains(&q[0]) && q[1] < 0.5))
        });
        space.set_edge_resolution(0.01).unwrap();
        let path = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.8],
            vec![0.8, 0.8],
            vec![1.0, 0.0],
        ];
        let smoothed = shortcut_path(&mut space, &path).unwrap();
        assert_eq!(smoothed[0], vec![0.0, 0.0]);
        assert_eq!(smoothed[smoothed.len() - 1], vec![1.0, 0.0]);
        assert!(smoothed.len() >= 3);
    }

    #[test]
    fn test_short_paths_untouched() {
        let mut space = make_gap_space();
        let path = vec![vec![0.0], vec![0.3]];
        assert_eq!(shortcut_path(&mut space, &path).unwrap(), path);
    }
}
