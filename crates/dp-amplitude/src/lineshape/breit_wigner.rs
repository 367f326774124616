use num_complex::Complex64;

use crate::kinematics::{DaughterPair, DecayKinematics, KinematicPoint, two_body_momentum};
use crate::lineshape::barrier::{barrier_ratio, zemach_factor};
use crate::lineshape::{Spin, running_width, validate_mass_width};
use dp_core::Result;

/// Relativistic Breit-Wigner with mass-dependent width.
///
/// `L(s) = 1 / (M² - s - i M Γ(s)) · √F(q) · Z(spin)`
///
/// where `Γ(s) = Γ0 (q/q0)^(2L+1) (M/√s) F(q)`, `F` is the Blatt-Weisskopf ratio and `Z` the
/// Zemach angular factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreitWigner {
    mass: f64,
    width: f64,
    spin: Spin,
}

impl BreitWigner {
    /// Create a Breit-Wigner; mass and width must be finite and > 0.
    pub fn new(mass: f64, width: f64, spin: Spin) -> Result<Self> {
        validate_mass_width("BreitWigner", mass, width)?;
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
        let gamma = running_width(self.width, self.mass, self.spin, q, q0, s, ff);

        let denom = Complex64::new(m_sq - s, -self.mass * gamma);
        let angular = zemach_factor(self.spin, kin, point, pair);
        denom.inv() * (ff.sqrt() * angular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar_peak_is_purely_imaginary() {
        let kin = DecayKinematics::d_to_three_pions();
        let bw = BreitWigner::new(0.9, 0.1, Spin::S).unwrap();
        let s12 = 0.81;
        let (a, b) = kin.s13_limits_at(s12).unwrap();
        let p = kin.point(s12, 0.5 * (a + b));
        let v = bw.evaluate(&kin, &p, DaughterPair::P12);
        assert_relative_eq!(v.re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.im, 1.0 / (0.9 * 0.1), epsilon = 1e-9);
    }

    #[test]
    fn test_phase_rotates_through_resonance() {
        let kin = DecayKinematics::d_to_three_pions();
        let bw = BreitWigner::new(0.9, 0.1, Spin::S).unwrap();
        let below = bw.evaluate(&kin, &kin.point(0.6, 1.2), DaughterPair::P12).arg();
        let above = bw.evaluate(&kin, &kin.point(1.0, 1.2), DaughterPair::P12).arg();
        assert!(below > 0.0 && below < std::f64::consts::FRAC_PI_2);
        assert!(above > std::f64::consts::FRAC_PI_2 && above < std::f64::consts::PI);
    }

    #[test]
    fn test_rejects_non_positive_width() {
        assert!(BreitWigner::new(0.77, 0.0, Spin::P).is_err());
        assert!(BreitWigner::new(f64::NAN, 0.1, Spin::P).is_err());
    }
}
