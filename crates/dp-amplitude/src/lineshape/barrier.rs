//! Centrifugal barrier and angular factors shared by the resonant lineshapes.

use crate::kinematics::{DaughterPair, DecayKinematics, KinematicPoint};
use crate::lineshape::Spin;

/// Squared Blatt-Weisskopf denominator `B_L(z)` with `z = (r q)²`.
///
/// - `L = 0`: `1`
/// - `L = 1`: `1 + z`
/// - `L = 2`: `9 + 3z + z²`
#[inline]
pub fn blatt_weisskopf_sq(spin: Spin, q: f64, radius: f64) -> f64 {
    let z = (radius * q) * (radius * q);
    match spin {
        Spin::S => 1.0,
        Spin::P => 1.0 + z,
        Spin::D => 9.0 + 3.0 * z + z * z,
    }
}

/// Form-factor ratio `B_L(q0) / B_L(q)`; equals 1 at the nominal momentum.
#[inline]
pub fn barrier_ratio(spin: Spin, q0: f64, q: f64, radius: f64) -> f64 {
    match spin {
        Spin::S => 1.0,
        _ => blatt_weisskopf_sq(spin, q0, radius) / blatt_weisskopf_sq(spin, q, radius),
    }
}

/// Zemach angular factor for a resonance of spin `spin` in `pair`.
///
/// The daughters are labelled cyclically: `A`, `B` form the resonance and `C` is the
/// bachelor. For `L = 1` the factor is `-(s_BC - s_AC + (M² - m_C²)(m_A² - m_B²) / s_AB)`;
/// the `L = 2` factor is built from the same quantity minus the trace term.
pub fn zemach_factor(
    spin: Spin,
    kin: &DecayKinematics,
    point: &KinematicPoint,
    pair: DaughterPair,
) -> f64 {
    if spin == Spin::S {
        return 1.0;
    }
    let [m1, m2, m3] = kin.daughter_masses();
    let (ma, mb, mc, s_ac, s_bc, s_ab) = match pair {
        DaughterPair::P12 => (m1, m2, m3, point.s13, point.s23, point.s12),
        DaughterPair::P13 => (m3, m1, m2, point.s23, point.s12, point.s13),
        DaughterPair::P23 => (m2, m3, m1, point.s12, point.s13, point.s23),
    };
    let big_m = kin.mother_mass();
    let m_sq = big_m * big_m;
    let (ma_sq, mb_sq, mc_sq) = (ma * ma, mb * mb, mc * mc);

    let p_wave = -((s_bc - s_ac) + (m_sq - mc_sq) * (ma_sq - mb_sq) / s_ab);
    if spin == Spin::P {
        return p_wave;
    }

    let parent = (s_ab - 2.0 * m_sq - 2.0 * mc_sq) + (m_sq - mc_sq) * (m_sq - mc_sq) / s_ab;
    let resonance = (s_ab - 2.0 * ma_sq - 2.0 * mb_sq) + (ma_sq - mb_sq) * (ma_sq - mb_sq) / s_ab;
    p_wave * p_wave - parent * resonance / 3.0
}
