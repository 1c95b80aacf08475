use std::f64::consts::{PI, TAU};

/// Cartesian three- and four-vectors with the collider coordinates ($`p_T`$, $`\eta`$, $`\phi`$)
/// used throughout the crate.
pub mod vectors;

/// Wrap an azimuthal angle (or a difference of two) into $`(-\pi, \pi]`$.
pub fn wrap_phi(phi: f64) -> f64 {
    let wrapped = phi.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Generated names `v0, v1, ...` for an unnamed feature axis of the given length.
pub fn indexed_names(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_wrap_phi_range() {
        assert_relative_eq!(wrap_phi(0.3), 0.3);
        assert_relative_eq!(wrap_phi(-0.3), -0.3);
        assert_relative_eq!(wrap_phi(PI), PI);
        assert_relative_eq!(wrap_phi(-PI), PI);
        assert_relative_eq!(wrap_phi(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_phi(-5.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_indexed_names() {
        assert_eq!(indexed_names("v", 3), vec!["v0", "v1", "v2"]);
        assert!(indexed_names("v", 0).is_empty());
    }
}
