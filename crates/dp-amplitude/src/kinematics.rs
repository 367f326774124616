//! Three-body decay kinematics: Dalitz boundary and derived invariants.
//!
//! A point of the Dalitz plot is the pair of invariant masses squared `(s12, s13)`. The third
//! invariant is fixed by energy-momentum conservation:
//!
//! `s12 + s13 + s23 = M² + m1² + m2² + m3²`
//!
//! Every caller (density evaluation, integration grid, toy generator) derives `s23` through
//! [`DecayKinematics::derived_s23`] so the region mask is identical everywhere.

use dp_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Charged pion mass (GeV).
pub const PION_MASS: f64 = 0.139_570_18;
/// Neutral pion mass (GeV).
pub const NEUTRAL_PION_MASS: f64 = 0.134_976_6;
/// Charged kaon mass (GeV).
pub const KAON_MASS: f64 = 0.493_677;
/// Neutral kaon mass (GeV).
pub const NEUTRAL_KAON_MASS: f64 = 0.497_614;
/// D± meson mass (GeV).
pub const D_PLUS_MASS: f64 = 1.869_59;
/// Default Blatt-Weisskopf meson radius (GeV⁻¹).
pub const DEFAULT_MESON_RADIUS: f64 = 1.5;

/// Daughter pair a resonance couples to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaughterPair {
    /// Daughters 1 and 2 (invariant `s12`).
    P12,
    /// Daughters 1 and 3 (invariant `s13`).
    P13,
    /// Daughters 2 and 3 (invariant `s23`).
    P23,
}

impl DaughterPair {
    /// Short label (`"12"`, `"13"`, `"23"`).
    pub fn label(self) -> &'static str {
        match self {
            DaughterPair::P12 => "12",
            DaughterPair::P13 => "13",
            DaughterPair::P23 => "23",
        }
    }
}

/// One location in the Dalitz plot with all three invariants resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicPoint {
    /// `m²(12)`
    pub s12: f64,
    /// `m²(13)`
    pub s13: f64,
    /// `m²(23)`, derived.
    pub s23: f64,
}

impl KinematicPoint {
    /// Invariant mass squared of the given daughter pair.
    #[inline]
    pub fn pair_mass_sq(&self, pair: DaughterPair) -> f64 {
        match pair {
            DaughterPair::P12 => self.s12,
            DaughterPair::P13 => self.s13,
            DaughterPair::P23 => self.s23,
        }
    }
}

/// Masses and meson radius of a `M → d1 d2 d3` decay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayKinematics {
    mother_mass: f64,
    daughter_masses: [f64; 3],
    meson_radius: f64,
}

impl DecayKinematics {
    /// Create a decay description.
    ///
    /// Masses must be finite and non-negative, the mother must be heavier than the sum of the
    /// daughters, and the meson radius must be finite and > 0.
    pub fn new(mother_mass: f64, daughter_masses: [f64; 3], meson_radius: f64) -> Result<Self> {
        if !mother_mass.is_finite() || mother_mass <= 0.0 {
            return Err(Error::Validation(format!(
                "mother mass must be finite and > 0, got {mother_mass}"
            )));
        }
        for (i, &m) in daughter_masses.iter().enumerate() {
            if !m.is_finite() || m < 0.0 {
                return Err(Error::Validation(format!(
                    "daughter {} mass must be finite and >= 0, got {m}",
                    i + 1
                )));
            }
        }
        let sum: f64 = daughter_masses.iter().sum();
        if mother_mass <= sum {
            return Err(Error::Validation(format!(
                "decay is kinematically closed: mother mass {mother_mass} <= daughter mass sum {sum}"
            )));
        }
        if !meson_radius.is_finite() || meson_radius <= 0.0 {
            return Err(Error::Validation(format!(
                "meson radius must be finite and > 0, got {meson_radius}"
            )));
        }
        Ok(Self { mother_mass, daughter_masses, meson_radius })
    }

    /// Decay into three daughters of identical mass.
    pub fn equal_mass(mother_mass: f64, daughter_mass: f64, meson_radius: f64) -> Result<Self> {
        Self::new(mother_mass, [daughter_mass; 3], meson_radius)
    }

    /// `D⁺ → π⁺ π⁻ π⁺` with the default meson radius.
    pub fn d_to_three_pions() -> Self {
        Self {
            mother_mass: D_PLUS_MASS,
            daughter_masses: [PION_MASS; 3],
            meson_radius: DEFAULT_MESON_RADIUS,
        }
    }

    /// Mother mass `M`.
    pub fn mother_mass(&self) -> f64 {
        self.mother_mass
    }

    /// Daughter masses `[m1, m2, m3]`.
    pub fn daughter_masses(&self) -> [f64; 3] {
        self.daughter_masses
    }

    /// Blatt-Weisskopf meson radius shared by every resonance term.
    pub fn meson_radius(&self) -> f64 {
        self.meson_radius
    }

    /// `M² + m1² + m2² + m3²`.
    #[inline]
    pub fn mass_sum_sq(&self) -> f64 {
        let [m1, m2, m3] = self.daughter_masses;
        self.mother_mass * self.mother_mass + m1 * m1 + m2 * m2 + m3 * m3
    }

    /// Third invariant from the other two.
    #[inline]
    pub fn derived_s23(&self, s12: f64, s13: f64) -> f64 {
        self.mass_sum_sq() - s12 - s13
    }

    /// Resolve all three invariants of `(s12, s13)`.
    #[inline]
    pub fn point(&self, s12: f64, s13: f64) -> KinematicPoint {
        KinematicPoint { s12, s13, s23: self.derived_s23(s12, s13) }
    }

    /// Two-body limits `[(m1+m2)², (M−m3)²]` for `s12`.
    pub fn s12_limits(&self) -> (f64, f64) {
        let [m1, m2, m3] = self.daughter_masses;
        ((m1 + m2).powi(2), (self.mother_mass - m3).powi(2))
    }

    /// Two-body limits `[(m1+m3)², (M−m2)²]` for `s13`.
    pub fn s13_limits(&self) -> (f64, f64) {
        let [m1, m2, m3] = self.daughter_masses;
        ((m1 + m3).powi(2), (self.mother_mass - m2).powi(2))
    }

    /// Two-body limits `[(m2+m3)², (M−m1)²]` for `s23`.
    pub fn s23_limits(&self) -> (f64, f64) {
        let [m1, m2, m3] = self.daughter_masses;
        ((m2 + m3).powi(2), (self.mother_mass - m1).powi(2))
    }

    /// Bounding rectangle `[s12 limits, s13 limits]` of the physical region.
    pub fn bounding_box(&self) -> [(f64, f64); 2] {
        [self.s12_limits(), self.s13_limits()]
    }

    /// Exact `s13` range at fixed `s12`, from the energies of daughters 1 and 3 in the
    /// rest frame of the (12) system. `None` when `s12` is outside its two-body limits.
    pub fn s13_limits_at(&self, s12: f64) -> Option<(f64, f64)> {
        let (lo, hi) = self.s12_limits();
        if !(s12 >= lo && s12 <= hi) || s12 <= 0.0 {
            return None;
        }
        let [m1, m2, m3] = self.daughter_masses;
        let m12 = s12.sqrt();
        let e1 = 0.5 * (s12 - m2 * m2 + m1 * m1) / m12;
        let e3 = 0.5 * (self.mother_mass * self.mother_mass - s12 - m3 * m3) / m12;
        let p1 = (e1 * e1 - m1 * m1).max(0.0).sqrt();
        let p3 = (e3 * e3 - m3 * m3).max(0.0).sqrt();
        let e_sum_sq = (e1 + e3) * (e1 + e3);
        Some((e_sum_sq - (p1 + p3) * (p1 + p3), e_sum_sq - (p1 - p3) * (p1 - p3)))
    }

    /// Whether `(s12, s13)` lies inside the kinematically allowed region.
    ///
    /// All three invariants must sit within their two-body limits and `s13` within the exact
    /// Dalitz limits at this `s12`.
    pub fn is_in_region(&self, s12: f64, s13: f64) -> bool {
        if !(s12.is_finite() && s13.is_finite()) {
            return false;
        }
        let within = |x: f64, (lo, hi): (f64, f64)| x >= lo && x <= hi;
        let s23 = self.derived_s23(s12, s13);
        if !(within(s12, self.s12_limits())
            && within(s13, self.s13_limits())
            && within(s23, self.s23_limits()))
        {
            return false;
        }
        match self.s13_limits_at(s12) {
            Some(limits) => within(s13, limits),
            None => false,
        }
    }

    /// Masses `(ma, mb)` of the two daughters forming `pair`.
    #[inline]
    pub fn pair_masses(&self, pair: DaughterPair) -> (f64, f64) {
        let [m1, m2, m3] = self.daughter_masses;
        match pair {
            DaughterPair::P12 => (m1, m2),
            DaughterPair::P13 => (m1, m3),
            DaughterPair::P23 => (m2, m3),
        }
    }
}

/// Momentum of either daughter in the rest frame of a two-body system of mass² `s`.
///
/// Below threshold the corresponding kinematic factor is taken as 1, which keeps nominal
/// momenta of sub-threshold resonance masses finite.
#[inline]
pub fn two_body_momentum(s: f64, ma: f64, mb: f64) -> f64 {
    if !(s > 0.0) {
        return 0.0;
    }
    let k1 = 1.0 - (ma + mb) * (ma + mb) / s;
    let k1 = if k1 >= 0.0 { k1.sqrt() } else { 1.0 };
    let k2 = 1.0 - (ma - mb) * (ma - mb) / s;
    let k2 = if k2 >= 0.0 { k2.sqrt() } else { 1.0 };
    0.5 * s.sqrt() * k1 * k2
}
