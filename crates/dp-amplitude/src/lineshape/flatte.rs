use num_complex::Complex64;

use crate::kinematics::{KAON_MASS, NEUTRAL_KAON_MASS, NEUTRAL_PION_MASS, PION_MASS};
use dp_core::{Error, Result};

/// Flatté coupled-channel lineshape (ππ and KK̄) for the f0(980).
///
/// `L(s) = 1 / (M² - s - i (g_ππ ρ_ππ(s) + g_KK ρ_KK(s)))`
///
/// Phase-space factors average over isospin partners: ππ is ⅔ charged + ⅓ neutral, KK̄ is
/// ½ charged + ½ neutral. Below a channel threshold its `ρ` continues analytically onto the
/// imaginary axis and shifts the real part of the denominator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flatte {
    mass: f64,
    g_pipi: f64,
    g_kk: f64,
}

impl Flatte {
    /// Create a Flatté lineshape; the mass must be > 0 and couplings finite and >= 0.
    pub fn new(mass: f64, g_pipi: f64, g_kk: f64) -> Result<Self> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::Validation(format!(
                "Flatte: mass must be finite and > 0, got {mass}"
            )));
        }
        for (name, g) in [("g_pipi", g_pipi), ("g_kk", g_kk)] {
            if !g.is_finite() || g < 0.0 {
                return Err(Error::Validation(format!(
                    "Flatte: {name} must be finite and >= 0, got {g}"
                )));
            }
        }
        Ok(Self { mass, g_pipi, g_kk })
    }

    /// Nominal mass.
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// ππ coupling.
    pub fn g_pipi(&self) -> f64 {
        self.g_pipi
    }

    /// KK̄ coupling.
    pub fn g_kk(&self) -> f64 {
        self.g_kk
    }

    pub(crate) fn evaluate(&self, s: f64) -> Complex64 {
        let pipi = channel_rho(s, &[(PION_MASS, 2.0 / 3.0), (NEUTRAL_PION_MASS, 1.0 / 3.0)]);
        let kk = channel_rho(s, &[(KAON_MASS, 0.5), (NEUTRAL_KAON_MASS, 0.5)]);

        let re = self.mass * self.mass - s + self.g_pipi * pipi.im + self.g_kk * kk.im;
        let im = self.g_pipi * pipi.re + self.g_kk * kk.re;
        Complex64::new(re, im) / (re * re + im * im)
    }
}

/// Weighted two-body phase space `Σ w √(1 - 4m²/s)` with analytic continuation below threshold.
fn channel_rho(s: f64, partners: &[(f64, f64)]) -> Complex64 {
    let mut rho = Complex64::new(0.0, 0.0);
    if !(s > 0.0) {
        return rho;
    }
    for &(m, weight) in partners {
        let x = 4.0 * m * m / s;
        if x <= 1.0 {
            rho.re += weight * (1.0 - x).sqrt();
        } else {
            rho.im += weight * (x - 1.0).sqrt();
        }
    }
    rho
}
