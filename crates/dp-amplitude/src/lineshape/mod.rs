//! Complex lineshapes `L_k(s)` for resonance terms of a Dalitz amplitude.
//!
//! Every lineshape is evaluated at a resolved [`KinematicPoint`] for a given daughter pair.
//! Resonant shapes include the Blatt-Weisskopf barrier ratio and the Zemach angular factor;
//! the non-resonant and coupled-channel shapes are angular-flat.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::kinematics::{DaughterPair, DecayKinematics, KinematicPoint};
use dp_core::{Error, Result};

pub mod barrier;
mod breit_wigner;
mod flatte;
mod gounaris_sakurai;
mod spline;

pub use breit_wigner::BreitWigner;
pub use flatte::Flatte;
pub use gounaris_sakurai::GounarisSakurai;
pub use spline::SplineWave;

/// Orbital angular momentum of a resonance (0, 1 or 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Spin {
    /// `L = 0`
    S,
    /// `L = 1`
    P,
    /// `L = 2`
    D,
}

impl Spin {
    /// Numeric value of `L`.
    pub fn l(self) -> u8 {
        match self {
            Spin::S => 0,
            Spin::P => 1,
            Spin::D => 2,
        }
    }
}

impl TryFrom<u8> for Spin {
    type Error = Error;

    fn try_from(l: u8) -> Result<Self> {
        match l {
            0 => Ok(Spin::S),
            1 => Ok(Spin::P),
            2 => Ok(Spin::D),
            _ => Err(Error::Validation(format!("spin must be 0, 1 or 2, got {l}"))),
        }
    }
}

impl From<Spin> for u8 {
    fn from(s: Spin) -> u8 {
        s.l()
    }
}

/// Resonance width scaled by momentum, barrier ratio and `M/√s`.
#[inline]
pub(crate) fn running_width(
    width: f64,
    mass: f64,
    spin: Spin,
    q: f64,
    q0: f64,
    s: f64,
    ff: f64,
) -> f64 {
    width * (q / q0).powi(2 * spin.l() as i32 + 1) * (mass / s.sqrt()) * ff
}

pub(crate) fn validate_mass_width(kind: &str, mass: f64, width: f64) -> Result<()> {
    if !mass.is_finite() || mass <= 0.0 {
        return Err(Error::Validation(format!("{kind}: mass must be finite and > 0, got {mass}")));
    }
    if !width.is_finite() || width <= 0.0 {
        return Err(Error::Validation(format!(
            "{kind}: width must be finite and > 0, got {width}"
        )));
    }
    Ok(())
}

/// Lineshape family of one resonance term.
#[derive(Debug, Clone, PartialEq)]
pub enum Lineshape {
    /// Relativistic Breit-Wigner with running width.
    BreitWigner(BreitWigner),
    /// Gounaris-Sakurai form for broad vector resonances.
    GounarisSakurai(GounarisSakurai),
    /// Two-channel (ππ, KK̄) Flatté form.
    Flatte(Flatte),
    /// Constant `1 + 0i` over the whole region.
    NonResonant,
    /// Natural cubic spline through measured complex knots.
    Spline(SplineWave),
}

impl Lineshape {
    /// Family name used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Lineshape::BreitWigner(_) => "rbw",
            Lineshape::GounarisSakurai(_) => "gounaris_sakurai",
            Lineshape::Flatte(_) => "flatte",
            Lineshape::NonResonant => "non_resonant",
            Lineshape::Spline(_) => "spline",
        }
    }

    /// Evaluate `L(s)` at `point` for the daughter pair the resonance couples to.
    ///
    /// Finite for every point of the physical region.
    pub fn evaluate(
        &self,
        kin: &DecayKinematics,
        point: &KinematicPoint,
        pair: DaughterPair,
    ) -> Complex64 {
        match self {
            Lineshape::BreitWigner(bw) => bw.evaluate(kin, point, pair),
            Lineshape::GounarisSakurai(gs) => gs.evaluate(kin, point, pair),
            Lineshape::Flatte(f) => f.evaluate(point.pair_mass_sq(pair)),
            Lineshape::NonResonant => Complex64::new(1.0, 0.0),
            Lineshape::Spline(w) => w.evaluate(point.pair_mass_sq(pair)),
        }
    }

    /// Spline wave, when this is a spline lineshape.
    pub fn spline(&self) -> Option<&SplineWave> {
        match self {
            Lineshape::Spline(w) => Some(w),
            _ => None,
        }
    }

    pub(crate) fn spline_mut(&mut self) -> Option<&mut SplineWave> {
        match self {
            Lineshape::Spline(w) => Some(w),
            _ => None,
        }
    }
}
