use std::{fmt::Display, iter::Sum};

use auto_ops::{impl_op_ex, impl_op_ex_commutative};

use crate::utils::wrap_phi;

/// Pseudorapidity reported for momenta parallel to the beam axis.
const BEAM_AXIS_ETA: f64 = 1e10;

/// A three-vector with Cartesian components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    /// The $`x`$-component.
    pub x: f64,
    /// The $`y`$-component.
    pub y: f64,
    /// The $`z`$-component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new [`Vec3`] from its components.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
    /// Attach a mass to this three-momentum, producing a [`Vec4`].
    pub fn with_mass(&self, mass: f64) -> Vec4 {
        let e = (mass.powi(2) + self.mag2()).sqrt();
        Vec4::new(self.x, self.y, self.z, e)
    }
    /// Attach an energy to this three-momentum, producing a [`Vec4`].
    pub fn with_energy(&self, energy: f64) -> Vec4 {
        Vec4::new(self.x, self.y, self.z, energy)
    }
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }
    pub fn mag2(&self) -> f64 {
        self.dot(self)
    }
    pub fn mag(&self) -> f64 {
        self.mag2().sqrt()
    }
    /// The magnitude of the component transverse to the $`z`$-axis.
    pub fn pt(&self) -> f64 {
        self.x.hypot(self.y)
    }
    /// The azimuthal angle in $`(-\pi, \pi]`$.
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }
    /// The pseudorapidity $`\eta = \sinh^{-1}(p_z / p_T)`$.
    ///
    /// Vectors along the beam axis get a large finite value with the sign of $`p_z`$, and the
    /// null vector gets zero.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt > 0.0 {
            (self.z / pt).asinh()
        } else if self.z > 0.0 {
            BEAM_AXIS_ETA
        } else if self.z < 0.0 {
            -BEAM_AXIS_ETA
        } else {
            0.0
        }
    }
    fn add(&self, other: &Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
    fn sub(&self, other: &Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
    fn mul(&self, other: f64) -> Self {
        Self::new(self.x * other, self.y * other, self.z * other)
    }
    fn neg(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl_op_ex!(+ |a: &Vec3, b: &Vec3| -> Vec3 { a.add(b) });
impl_op_ex!(-|a: &Vec3, b: &Vec3| -> Vec3 { a.sub(b) });
impl_op_ex!(-|a: &Vec3| -> Vec3 { a.neg() });
impl_op_ex_commutative!(*|a: &Vec3, b: &f64| -> Vec3 { a.mul(*b) });

/// A four-vector stored as $`(p_x, p_y, p_z, E)`$.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec4 {
    /// The $`x`$-component.
    pub x: f64,
    /// The $`y`$-component.
    pub y: f64,
    /// The $`z`$-component.
    pub z: f64,
    /// The time-like component.
    pub t: f64,
}

impl Vec4 {
    /// Create a new [`Vec4`] from $`(p_x, p_y, p_z, E)`$.
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self {
            x: px,
            y: py,
            z: pz,
            t: e,
        }
    }
    /// Build a four-momentum from transverse momentum, pseudorapidity, azimuth and mass.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        let p3 = Vec3::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh());
        if mass >= 0.0 {
            p3.with_mass(mass)
        } else {
            p3.with_energy((p3.mag2() - mass * mass).max(0.0).sqrt())
        }
    }
    /// Build a four-momentum from transverse momentum, pseudorapidity, azimuth and energy.
    pub fn from_pt_eta_phi_e(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        Vec3::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh()).with_energy(e)
    }
    pub fn px(&self) -> f64 {
        self.x
    }
    pub fn py(&self) -> f64 {
        self.y
    }
    pub fn pz(&self) -> f64 {
        self.z
    }
    pub fn e(&self) -> f64 {
        self.t
    }
    pub fn vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
    pub fn pt(&self) -> f64 {
        self.vec3().pt()
    }
    pub fn eta(&self) -> f64 {
        self.vec3().eta()
    }
    pub fn phi(&self) -> f64 {
        self.vec3().phi()
    }
    /// The rapidity $`y = \frac{1}{2}\ln\frac{E + p_z}{E - p_z}`$.
    pub fn rapidity(&self) -> f64 {
        0.5 * ((self.t + self.z) / (self.t - self.z)).ln()
    }
    /// The squared invariant mass.
    pub fn m2(&self) -> f64 {
        self.t * self.t - self.vec3().mag2()
    }
    /// The invariant mass, negative for space-like vectors.
    pub fn m(&self) -> f64 {
        let m2 = self.m2();
        if m2 < 0.0 {
            -(-m2).sqrt()
        } else {
            m2.sqrt()
        }
    }
    /// The azimuthal difference `self - other`, wrapped into $`(-\pi, \pi]`$.
    pub fn delta_phi(&self, other: &Self) -> f64 {
        wrap_phi(self.phi() - other.phi())
    }
    /// The squared angular distance $`\Delta\eta^2 + \Delta\phi^2`$ to `other`.
    pub fn delta_r2(&self, other: &Self) -> f64 {
        let deta = self.eta() - other.eta();
        let dphi = self.delta_phi(other);
        deta * deta + dphi * dphi
    }
    /// A compact string of the components.
    pub fn to_p4_string(&self) -> String {
        format!(
            "[e = {:.5}; p = ({:.5}, {:.5}, {:.5}); m = {:.5}]",
            self.t,
            self.x,
            self.y,
            self.z,
            self.m()
        )
    }
    fn add(&self, other: &Self) -> Self {
        Self::new(
            self.x + other.x,
            self.y + other.y,
            self.z + other.z,
            self.t + other.t,
        )
    }
    fn sub(&self, other: &Self) -> Self {
        Self::new(
            self.x - other.x,
            self.y - other.y,
            self.z - other.z,
            self.t - other.t,
        )
    }
    fn neg(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.t)
    }
}

impl Display for Vec4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_p4_string())
    }
}

impl_op_ex!(+ |a: &Vec4, b: &Vec4| -> Vec4 { a.add(b) });
impl_op_ex!(-|a: &Vec4, b: &Vec4| -> Vec4 { a.sub(b) });
impl_op_ex!(-|a: &Vec4| -> Vec4 { a.neg() });

impl Sum for Vec4 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Vec4::default(), |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a Vec4> for Vec4 {
    fn sum<I: Iterator<Item = &'a Vec4>>(iter: I) -> Self {
        iter.fold(Vec4::default(), |acc, v| acc + v)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    use super::*;

    #[test]
    fn test_vec_sums() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        let c = a + b;
        assert_eq!(c, Vec3::new(5.0, 7.0, 9.0));
        let p = Vec4::new(1.0, 2.0, 3.0, 10.0);
        let q = Vec4::new(-1.0, 0.5, 1.0, 4.0);
        let total: Vec4 = [p, q].iter().sum();
        assert_eq!(total, Vec4::new(0.0, 2.5, 4.0, 14.0));
        assert_eq!(p - q, Vec4::new(2.0, 1.5, 2.0, 6.0));
    }

    #[test]
    fn test_three_to_four_momentum_conversion() {
        let p3 = Vec3::new(1.0, 2.0, 3.0);
        let target = Vec4::new(1.0, 2.0, 3.0, 10.0);
        let p4_from_mass = p3.with_mass(target.m());
        let p4_from_energy = p3.with_energy(target.e());
        assert_relative_eq!(p4_from_mass.e(), target.e());
        assert_relative_eq!(p4_from_energy.e(), target.e());
        assert_relative_eq!(p4_from_mass.px(), target.px());
        assert_relative_eq!(p4_from_mass.pz(), target.pz());
    }

    #[test]
    fn test_four_momentum_basics() {
        let p = Vec4::new(3.0, 4.0, 5.0, 10.0);
        assert_relative_eq!(p.pt(), 5.0);
        assert_relative_eq!(p.m2(), 50.0);
        assert_relative_eq!(p.m(), 50.0_f64.sqrt());
        assert_relative_eq!(p.phi(), 4.0_f64.atan2(3.0));
        assert_relative_eq!(p.eta(), 1.0_f64.asinh());
        assert_relative_eq!(p.rapidity(), 0.5 * (15.0_f64 / 5.0).ln());
    }

    #[test]
    fn test_space_like_mass_is_negative() {
        let p = Vec4::new(3.0, 4.0, 0.0, 3.0);
        assert_relative_eq!(p.m(), -4.0);
    }

    #[test]
    fn test_pt_eta_phi_round_trip() {
        let p = Vec4::from_pt_eta_phi_m(100.0, -1.3, 2.9, 12.0);
        assert_relative_eq!(p.pt(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(p.eta(), -1.3, epsilon = 1e-12);
        assert_relative_eq!(p.phi(), 2.9, epsilon = 1e-12);
        assert_relative_eq!(p.m(), 12.0, epsilon = 1e-8);
        let q = Vec4::from_pt_eta_phi_e(20.0, 0.4, -0.7, 25.0);
        assert_relative_eq!(q.e(), 25.0);
        assert_relative_eq!(q.pt(), 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_beam_axis_eta() {
        assert_eq!(Vec3::new(0.0, 0.0, 2.0).eta(), BEAM_AXIS_ETA);
        assert_eq!(Vec3::new(0.0, 0.0, -2.0).eta(), -BEAM_AXIS_ETA);
        assert_eq!(Vec3::default().eta(), 0.0);
    }

    #[test]
    fn test_delta_phi_wraps_across_pi() {
        let a = Vec4::from_pt_eta_phi_m(1.0, 0.0, PI - 0.1, 0.0);
        let b = Vec4::from_pt_eta_phi_m(1.0, 0.0, -PI + 0.1, 0.0);
        assert_relative_eq!(a.delta_phi(&b), -0.2, epsilon = 1e-12);
        assert_relative_eq!(b.delta_phi(&a), 0.2, epsilon = 1e-12);
        assert_relative_eq!(a.delta_r2(&b), 0.04, epsilon = 1e-12);
    }
}
