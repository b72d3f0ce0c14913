//! Fundamental types: configurations and the default metric.

mod math;

pub use math::{euclidean_distance, lerp_config};

/// A configuration (C-space point): an ordered tuple of reals.
///
/// The engine never interprets the coordinates; dimension is fixed by the
/// host problem. An empty vector is the zero-dimensional degenerate case.
pub type Config = Vec<f64>;

/// Check that two configurations share a dimension.
///
/// Returns the common dimension or an error naming the mismatch.
pub fn check_dims(a: &[f64], b: &[f64]) -> crate::Result<usize> {
    if a.len() != b.len() {
        return Err(crate::PlanError::InvalidArgument(format!(
            "configuration dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dims() {
        assert_eq!(check_dims(&[0.0, 1.0], &[2.0, 3.0]).unwrap(), 2);
        assert!(check_dims(&[0.0], &[1.0, 2.0]).is_err());
        assert_eq!(check_dims(&[], &[]).unwrap(), 0);
    }
}
