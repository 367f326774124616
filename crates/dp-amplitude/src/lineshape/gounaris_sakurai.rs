use std::f64::consts::PI;

use num_complex::Complex64;

use crate::kinematics::{DaughterPair, DecayKinematics, KinematicPoint, two_body_momentum};
use crate::lineshape::barrier::{barrier_ratio, zemach_factor};
use crate::lineshape::{Spin, running_width, validate_mass_width};
use dp_core::Result;

/// Gounaris-Sakurai lineshape for broad vector resonances decaying to a pair of equal-mass
/// daughters (the ρ → ππ case).
///
/// `L(s) = (1 + d Γ0/M) / (M² - s + f(s) - i M Γ(s)) · √F(q) · Z(spin)`
///
/// `f(s)` is the dispersive correction to the real part built from
/// `h(s) = (2/π)(k/√s) ln((√s + 2k) / (ma + mb))`, and `d` fixes `L(0)` to the
/// Breit-Wigner normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GounarisSakurai {
    mass: f64,
    width: f64,
    spin: Spin,
}

impl GounarisSakurai {
    /// Create a Gounaris-Sakurai lineshape; mass and width must be finite and > 0.
    pub fn new(mass: f64, width: f64, spin: Spin) -> Result<Self> {
        validate_mass_width("GounarisSakurai", mass, width)?;
        Ok(Self { mass, width, spin })
    }

    /// Nominal mass.
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Nominal width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Orbital angular momentum.
    pub fn spin(&self) -> Spin {
        self.spin
    }

    pub(crate) fn evaluate(
        &self,
        kin: &DecayKinematics,
        point: &KinematicPoint,
        pair: DaughterPair,
    ) -> Complex64 {
        let s = point.pair_mass_sq(pair);
        let (ma, mb) = kin.pair_masses(pair);
        let m_sq = self.mass * self.mass;
        let q = two_body_momentum(s, ma, mb);
        let q0 = two_body_momentum(m_sq, ma, mb);
        let ff = barrier_ratio(self.spin, q0, q, kin.meson_radius());

        let norm = 1.0 + d_factor(self.mass, q0, ma + mb) * self.width / self.mass;
        let re = m_sq - s + f_correction(s, q, self.mass, q0, self.width, ma + mb);
        let im = self.mass * running_width(self.width, self.mass, self.spin, q, q0, s, ff);

        let angular = zemach_factor(self.spin, kin, point, pair);
        Complex64::new(re, im) * (norm / (re * re + im * im)) * (ff.sqrt() * angular)
    }
}

#[inline]
fn h(s: f64, k: f64, threshold: f64) -> f64 {
    let m = s.sqrt();
    (2.0 / PI) * (k / m) * ((m + 2.0 * k) / threshold).ln()
}

#[inline]
fn dh_ds(s: f64, k: f64, threshold: f64) -> f64 {
    h(s, k, threshold) * (1.0 / (8.0 * k * k) - 1.0 / (2.0 * s)) + 1.0 / (2.0 * PI * s)
}

fn f_correction(s: f64, k: f64, mass: f64, k0: f64, width: f64, threshold: f64) -> f64 {
    let m_sq = mass * mass;
    width * m_sq / (k0 * k0 * k0)
        * (k * k * (h(s, k, threshold) - h(m_sq, k0, threshold))
            + (m_sq - s) * k0 * k0 * dh_ds(m_sq, k0, threshold))
}

fn d_factor(mass: f64, k0: f64, threshold: f64) -> f64 {
    let th_sq = threshold * threshold;
    3.0 / PI * (th_sq / 4.0) / (k0 * k0) * ((mass + 2.0 * k0) / threshold).ln()
        + mass / (2.0 * PI * k0)
        - (th_sq / 4.0) * mass / (PI * k0 * k0 * k0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RHO_MASS: f64 = 0.77526;
    const RHO_WIDTH: f64 = 0.1478;

    #[test]
    fn test_correction_vanishes_at_nominal_mass() {
        let kin = DecayKinematics::d_to_three_pions();
        let (ma, mb) = kin.pair_masses(DaughterPair::P12);
        let m_sq = RHO_MASS * RHO_MASS;
        let q0 = two_body_momentum(m_sq, ma, mb);
        assert_relative_eq!(
            f_correction(m_sq, q0, RHO_MASS, q0, RHO_WIDTH, ma + mb),
            0.0,
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_pole_mass_gives_imaginary_amplitude_up_to_angular_factor() {
        let kin = DecayKinematics::d_to_three_pions();
        let gs = GounarisSakurai::new(RHO_MASS, RHO_WIDTH, Spin::P).unwrap();
        let s12 = RHO_MASS * RHO_MASS;
        let (a, b) = kin.s13_limits_at(s12).unwrap();
        let p = kin.point(s12, a + 0.25 * (b - a));
        let v = gs.evaluate(&kin, &p, DaughterPair::P12);
        assert_relative_eq!(v.re, 0.0, epsilon = 1e-10);
        assert!(v.im.abs() > 0.0);
    }

    #[test]
    fn test_d_factor_matches_known_rho_value() {
        // d ≈ 0.48 for the ρ(770) with charged pions.
        let m = crate::kinematics::PION_MASS;
        let q0 = two_body_momentum(RHO_MASS * RHO_MASS, m, m);
        let d = d_factor(RHO_MASS, q0, 2.0 * m);
        assert!((d - 0.48).abs() < 0.02, "d = {d}");
    }
}
