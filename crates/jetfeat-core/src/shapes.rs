use crate::Vec4;

/// Shape observables of a single jet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JetShape {
    /// $`p_T D = \sqrt{\sum p_T^2} / \sum p_T`$ over the constituents.
    pub ptd: f64,
    /// The minor axis of the $`p_T^2`$-weighted constituent spread in $`(\eta, \phi)`$.
    pub axis2: f64,
}

/// Running $`p_T^2`$-weighted moments of constituent offsets from the jet axis.
#[derive(Debug, Clone, Copy, Default)]
struct WeightedMoments {
    sum_weight: f64,
    sum_pt: f64,
    sum_deta: f64,
    sum_dphi: f64,
    sum_deta2: f64,
    sum_dphi2: f64,
    sum_detadphi: f64,
}

impl WeightedMoments {
    fn accumulate(&mut self, jet: &Vec4, constituent: &Vec4) {
        let deta = constituent.eta() - jet.eta();
        let dphi = constituent.delta_phi(jet);
        let pt = constituent.pt();
        let weight = pt * pt;
        self.sum_weight += weight;
        self.sum_pt += pt;
        self.sum_deta += deta * weight;
        self.sum_dphi += dphi * weight;
        self.sum_deta2 += deta * deta * weight;
        self.sum_dphi2 += dphi * dphi * weight;
        self.sum_detadphi += deta * dphi * weight;
    }

    /// The entries `(a, b, c)` of the covariance matrix `[[a, -c], [-c, b]]`.
    fn covariance(&self) -> (f64, f64, f64) {
        let ave_deta = self.sum_deta / self.sum_weight;
        let ave_dphi = self.sum_dphi / self.sum_weight;
        let ave_deta2 = self.sum_deta2 / self.sum_weight;
        let ave_dphi2 = self.sum_dphi2 / self.sum_weight;
        let a = ave_deta2 - ave_deta * ave_deta;
        let b = ave_dphi2 - ave_dphi * ave_dphi;
        let c = -(self.sum_detadphi / self.sum_weight - ave_deta * ave_dphi);
        (a, b, c)
    }
}

/// Compute $`p_T D`$ and the minor axis of a jet from its associated constituents.
///
/// The minor axis is the square root of the smaller eigenvalue of the weighted covariance of
/// $`(\Delta\eta, \Delta\phi)`$:
/// ```math
/// \sigma_2 = \sqrt{\tfrac{1}{2}\left(a + b - \sqrt{(a-b)^2 + 4c^2}\right)}
/// ```
/// Both observables are zero when the total weight vanishes, and a negative radicand from
/// rounding gives a zero minor axis.
pub fn jet_shape(jet: &Vec4, constituents: &[Vec4]) -> JetShape {
    let mut moments = WeightedMoments::default();
    for constituent in constituents {
        moments.accumulate(jet, constituent);
    }
    if moments.sum_weight <= 0.0 || moments.sum_pt <= 0.0 {
        return JetShape::default();
    }
    let (a, b, c) = moments.covariance();
    let delta = ((a - b) * (a - b) + 4.0 * c * c).abs().sqrt();
    let radicand = a + b - delta;
    let axis2 = if radicand > 0.0 {
        (0.5 * radicand).sqrt()
    } else {
        0.0
    };
    JetShape {
        ptd: moments.sum_weight.sqrt() / moments.sum_pt,
        axis2,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn massless(pt: f64, eta: f64, phi: f64) -> Vec4 {
        Vec4::from_pt_eta_phi_m(pt, eta, phi, 0.0)
    }

    #[test]
    fn test_empty_jet_has_zero_shape() {
        let jet = massless(100.0, 0.0, 0.0);
        assert_eq!(jet_shape(&jet, &[]), JetShape::default());
    }

    #[test]
    fn test_zero_momentum_constituents() {
        let jet = massless(100.0, 0.0, 0.0);
        let shape = jet_shape(&jet, &[Vec4::default(), Vec4::default()]);
        assert_eq!(shape, JetShape::default());
    }

    #[test]
    fn test_single_constituent_on_axis() {
        let jet = massless(100.0, 0.5, 1.0);
        let shape = jet_shape(&jet, &[jet]);
        assert_relative_eq!(shape.ptd, 1.0, epsilon = 1e-12);
        assert_eq!(shape.axis2, 0.0);
        let shape = jet_shape(&jet, &[massless(30.0, 0.5, 1.0)]);
        assert_relative_eq!(shape.ptd, 1.0, epsilon = 1e-12);
        assert_relative_eq!(shape.axis2, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_equal_constituents_ptd() {
        let jet = massless(100.0, 0.0, 0.0);
        let constituents = [
            massless(10.0, 0.1, 0.0),
            massless(10.0, -0.1, 0.0),
            massless(10.0, 0.0, 0.1),
            massless(10.0, 0.0, -0.1),
        ];
        let shape = jet_shape(&jet, &constituents);
        // sqrt(4 * 100) / 40
        assert_relative_eq!(shape.ptd, 0.5, epsilon = 1e-12);
        // isotropic spread with variance 0.005 along each axis
        assert_relative_eq!(shape.axis2, 0.005_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_collinear_spread_has_zero_minor_axis() {
        let jet = massless(100.0, 0.0, 0.0);
        let constituents = [
            massless(10.0, -0.2, 0.0),
            massless(20.0, 0.0, 0.0),
            massless(10.0, 0.2, 0.0),
        ];
        let shape = jet_shape(&jet, &constituents);
        assert_relative_eq!(shape.axis2, 0.0, epsilon = 1e-6);
        assert_relative_eq!(shape.ptd, 600.0_f64.sqrt() / 40.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shape_is_non_negative() {
        let jet = massless(80.0, -1.0, 0.1);
        let constituents = [
            massless(30.0, -1.1, 0.15),
            massless(8.0, -0.9, 0.05),
            massless(3.0, -0.8, 0.3),
        ];
        let shape = jet_shape(&jet, &constituents);
        assert!(shape.ptd >= 0.0);
        assert!(shape.axis2 >= 0.0);
        assert!(shape.ptd <= 1.0);
    }
}
