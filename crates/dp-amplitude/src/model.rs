//! Coherent Dalitz amplitude model.
//!
//! `A(s12, s13) = Σ_k c_k · n_k · L_k(s_pair(k))` where every complex coefficient `c_k` reads
//! its real and imaginary parts from a model-level parameter arena (two terms may share one
//! coefficient), `L_k` is the lineshape evaluated for the term's daughter pair and `n_k` is a
//! fixed per-term scale. The density is `|A|² · ε(s12, s13)` inside the physical region and
//! exactly zero outside.

use std::sync::Arc;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::efficiency::{ConstantEfficiency, Efficiency};
use crate::event_store::EventEnsemble;
use crate::kinematics::{DaughterPair, DecayKinematics, KinematicPoint};
use crate::lineshape::Lineshape;
use crate::normalize::IntegrationGrid;
use crate::pwa::{KNOT_MAGNITUDE_BOUNDS, KNOT_PHASE_BOUNDS};
use dp_core::{Error, Result};

/// Bounds of a floating coefficient component.
pub const COEFFICIENT_BOUNDS: (f64, f64) = (-100.0, 100.0);
/// Grid resolution used to compute lineshape scales.
pub const DEFAULT_SCALE_RESOLUTION: usize = 200;

/// A named real model parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Stable parameter name.
    pub name: String,
    /// Current value.
    pub value: f64,
    /// Bounds `(low, high)` reported to a fitter.
    pub bounds: (f64, f64),
    /// Fixed parameters are excluded from [`AmplitudeModel::free_parameters`].
    pub fixed: bool,
}

impl Parameter {
    /// Floating parameter.
    pub fn free(name: impl Into<String>, value: f64, bounds: (f64, f64)) -> Self {
        Self { name: name.into(), value, bounds, fixed: false }
    }

    /// Fixed parameter.
    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value, bounds: (value, value), fixed: true }
    }
}

/// Index of a parameter in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(usize);

impl ParamId {
    /// Position in [`AmplitudeModel::parameters`].
    pub fn index(self) -> usize {
        self.0
    }
}

/// Complex coefficient backed by two arena parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coefficient {
    re: ParamId,
    im: ParamId,
}

impl Coefficient {
    /// Real-part parameter.
    pub fn re(&self) -> ParamId {
        self.re
    }

    /// Imaginary-part parameter.
    pub fn im(&self) -> ParamId {
        self.im
    }
}

/// One resonance contribution to the amplitude.
#[derive(Debug, Clone)]
pub struct ResonanceTerm {
    name: String,
    lineshape: Lineshape,
    pair: DaughterPair,
    coefficient: Coefficient,
    scale: f64,
}

impl ResonanceTerm {
    /// Term name (unique within a model).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lineshape.
    pub fn lineshape(&self) -> &Lineshape {
        &self.lineshape
    }

    /// Daughter pair the lineshape is evaluated for.
    pub fn pair(&self) -> DaughterPair {
        self.pair
    }

    /// Coefficient handle.
    pub fn coefficient(&self) -> Coefficient {
        self.coefficient
    }

    /// Fixed lineshape scale `n_k`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Scaled lineshape `n_k · L_k` at `point` (coefficient excluded).
    #[inline]
    pub fn wave(&self, kin: &DecayKinematics, point: &KinematicPoint) -> Complex64 {
        self.lineshape.evaluate(kin, point, self.pair) * self.scale
    }

    fn has_free_shape(&self) -> bool {
        self.lineshape.spline().is_some_and(|w| w.table().has_free_knots())
    }
}

/// Free parameter as reported to a fitter.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeParameter {
    /// Stable name.
    pub name: String,
    /// Current value.
    pub value: f64,
    /// Bounds `(low, high)`.
    pub bounds: (f64, f64),
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Arena(usize),
    Knot { term: usize, knot: usize, phase: bool },
}

/// Coherent sum of resonance terms with an efficiency map.
#[derive(Debug, Clone)]
pub struct AmplitudeModel {
    kinematics: DecayKinematics,
    parameters: Vec<Parameter>,
    terms: Vec<ResonanceTerm>,
    efficiency: Arc<dyn Efficiency>,
    normalize_lineshapes: bool,
    scale_resolution: usize,
}

impl AmplitudeModel {
    /// Decay kinematics.
    pub fn kinematics(&self) -> &DecayKinematics {
        &self.kinematics
    }

    /// Parameter arena (free and fixed).
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Resonance terms in declaration order.
    pub fn terms(&self) -> &[ResonanceTerm] {
        &self.terms
    }

    /// Number of resonance terms.
    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    /// Position of the term called `name`.
    pub fn term_index(&self, name: &str) -> Option<usize> {
        self.terms.iter().position(|t| t.name == name)
    }

    /// Efficiency map.
    pub fn efficiency(&self) -> &dyn Efficiency {
        self.efficiency.as_ref()
    }

    /// Whether per-term lineshape scales are active.
    pub fn normalize_lineshapes(&self) -> bool {
        self.normalize_lineshapes
    }

    /// Parameter called `name`.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    fn parameter_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        self.parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::Validation(format!("unknown parameter '{name}'")))
    }

    /// Set the value of an arena parameter.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::Validation(format!("parameter '{name}' value must be finite")));
        }
        self.parameter_mut(name)?.value = value;
        Ok(())
    }

    /// Fix or release an arena parameter.
    pub fn set_parameter_fixed(&mut self, name: &str, fixed: bool) -> Result<()> {
        self.parameter_mut(name)?.fixed = fixed;
        Ok(())
    }

    /// Current value of a coefficient.
    #[inline]
    pub fn coefficient_value(&self, c: Coefficient) -> Complex64 {
        Complex64::new(self.parameters[c.re.0].value, self.parameters[c.im.0].value)
    }

    /// Current coefficients of every term, in term order.
    pub fn coefficient_values(&self) -> Vec<Complex64> {
        self.terms.iter().map(|t| self.coefficient_value(t.coefficient)).collect()
    }

    /// Overwrite the coefficient of term `term`; terms sharing it change too.
    pub fn set_coefficient(&mut self, term: &str, value: Complex64) -> Result<()> {
        let k = self
            .term_index(term)
            .ok_or_else(|| Error::Validation(format!("unknown resonance term '{term}'")))?;
        if !(value.re.is_finite() && value.im.is_finite()) {
            return Err(Error::Validation(format!("coefficient of '{term}' must be finite")));
        }
        let c = self.terms[k].coefficient;
        self.parameters[c.re.0].value = value.re;
        self.parameters[c.im.0].value = value.im;
        Ok(())
    }

    /// Scaled lineshapes of every term at `point`.
    pub(crate) fn waves_into(&self, point: &KinematicPoint, out: &mut [Complex64]) {
        debug_assert_eq!(out.len(), self.terms.len());
        for (o, t) in out.iter_mut().zip(&self.terms) {
            *o = t.wave(&self.kinematics, point);
        }
    }

    #[inline]
    fn amplitude_at(&self, point: &KinematicPoint) -> Complex64 {
        self.terms
            .iter()
            .map(|t| self.coefficient_value(t.coefficient) * t.wave(&self.kinematics, point))
            .sum()
    }

    /// Total complex amplitude at `(s12, s13)`; zero outside the physical region.
    pub fn total_amplitude(&self, s12: f64, s13: f64) -> Complex64 {
        if !self.kinematics.is_in_region(s12, s13) {
            return Complex64::new(0.0, 0.0);
        }
        self.amplitude_at(&self.kinematics.point(s12, s13))
    }

    /// Efficiency at `(s12, s13)`, clamped to be non-negative.
    #[inline]
    pub fn efficiency_at(&self, s12: f64, s13: f64) -> f64 {
        self.efficiency.evaluate(s12, s13).max(0.0)
    }

    /// Density `|A|² · ε`; zero outside the physical region.
    pub fn density(&self, s12: f64, s13: f64) -> f64 {
        if !self.kinematics.is_in_region(s12, s13) {
            return 0.0;
        }
        let amp = self.amplitude_at(&self.kinematics.point(s12, s13));
        amp.norm_sqr() * self.efficiency_at(s12, s13)
    }

    /// Densities of every event of an ensemble (parallel, order preserved).
    pub fn density_batch(&self, events: &EventEnsemble) -> Vec<f64> {
        let (s12, s13) = (events.s12(), events.s13());
        (0..events.len()).into_par_iter().map(|i| self.density(s12[i], s13[i])).collect()
    }

    fn free_slots(&self) -> Vec<(Slot, FreeParameter)> {
        let mut slots: Vec<(Slot, FreeParameter)> = self
            .parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.fixed)
            .map(|(i, p)| {
                let fp = FreeParameter { name: p.name.clone(), value: p.value, bounds: p.bounds };
                (Slot::Arena(i), fp)
            })
            .collect();
        for (k, term) in self.terms.iter().enumerate() {
            let Some(wave) = term.lineshape.spline() else { continue };
            for (i, knot) in wave.table().knots().iter().enumerate() {
                if !knot.magnitude_fixed {
                    slots.push((
                        Slot::Knot { term: k, knot: i, phase: false },
                        FreeParameter {
                            name: format!("{}_knot_{i}_mag", term.name),
                            value: knot.magnitude,
                            bounds: KNOT_MAGNITUDE_BOUNDS,
                        },
                    ));
                }
                if !knot.phase_fixed {
                    slots.push((
                        Slot::Knot { term: k, knot: i, phase: true },
                        FreeParameter {
                            name: format!("{}_knot_{i}_phase", term.name),
                            value: knot.phase,
                            bounds: KNOT_PHASE_BOUNDS,
                        },
                    ));
                }
            }
        }
        slots
    }

    /// Floating parameters in stable order: arena parameters first, then spline knots
    /// (magnitude before phase, knot by knot).
    pub fn free_parameters(&self) -> Vec<FreeParameter> {
        self.free_slots().into_iter().map(|(_, p)| p).collect()
    }

    /// Values of [`Self::free_parameters`].
    pub fn free_parameter_values(&self) -> Vec<f64> {
        self.free_slots().into_iter().map(|(_, p)| p.value).collect()
    }

    /// Assign every floating parameter, in [`Self::free_parameters`] order.
    ///
    /// Lineshape scales are not recomputed; call [`Self::refresh_term_scales`] for that.
    pub fn set_free_parameters(&mut self, values: &[f64]) -> Result<()> {
        let slots = self.free_slots();
        if values.len() != slots.len() {
            return Err(Error::Validation(format!(
                "free parameter length mismatch: expected {}, got {}",
                slots.len(),
                values.len()
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::Validation(format!(
                "free parameter {i} must be finite, got {}",
                values[i]
            )));
        }
        let mut dirty = vec![false; self.terms.len()];
        for ((slot, _), &v) in slots.iter().zip(values) {
            match *slot {
                Slot::Arena(i) => self.parameters[i].value = v,
                Slot::Knot { term, knot, phase } => {
                    if let Some(wave) = self.terms[term].lineshape.spline_mut() {
                        let k = &mut wave.table_mut().knots_mut()[knot];
                        if phase {
                            k.phase = v;
                        } else {
                            k.magnitude = v;
                        }
                        dirty[term] = true;
                    }
                }
            }
        }
        for (term, _) in dirty.iter().enumerate().filter(|(_, d)| **d) {
            if let Some(wave) = self.terms[term].lineshape.spline_mut() {
                wave.rebuild();
            }
        }
        Ok(())
    }

    /// Whether term `k` has lineshape parameters among the free parameters.
    pub fn term_has_free_shape(&self, k: usize) -> bool {
        self.terms.get(k).is_some_and(ResonanceTerm::has_free_shape)
    }

    /// Recompute the per-term lineshape scales from the current lineshapes.
    pub fn refresh_term_scales(&mut self) -> Result<()> {
        if !self.normalize_lineshapes {
            return Ok(());
        }
        let scales = term_scales(&self.kinematics, &self.terms, self.scale_resolution)?;
        for (t, s) in self.terms.iter_mut().zip(scales) {
            t.scale = s;
        }
        Ok(())
    }
}

/// `1 / sqrt(mean |L_k|²)` over the physical region, per term.
fn term_scales(
    kin: &DecayKinematics,
    terms: &[ResonanceTerm],
    resolution: usize,
) -> Result<Vec<f64>> {
    let grid = IntegrationGrid::new(kin, resolution)?;
    terms
        .iter()
        .map(|t| {
            let mean_sq = grid.mean(|s12, s13| {
                t.lineshape.evaluate(kin, &kin.point(s12, s13), t.pair).norm_sqr()
            });
            if mean_sq == 0.0 {
                log::warn!(
                    "term '{}' ({}) vanishes over the whole region; keeping scale 1",
                    t.name,
                    t.lineshape.kind()
                );
                return Ok(1.0);
            }
            if !(mean_sq.is_finite() && mean_sq > 0.0) {
                return Err(Error::DegenerateNormalization(format!(
                    "lineshape of term '{}' has mean |L|² = {mean_sq} over the region",
                    t.name
                )));
            }
            let scale = mean_sq.sqrt().recip();
            log::debug!("term '{}' ({}): lineshape scale {scale}", t.name, t.lineshape.kind());
            Ok(scale)
        })
        .collect()
}

/// Incremental construction of an [`AmplitudeModel`].
#[derive(Debug)]
pub struct AmplitudeModelBuilder {
    kinematics: DecayKinematics,
    parameters: Vec<Parameter>,
    terms: Vec<ResonanceTerm>,
    efficiency: Arc<dyn Efficiency>,
    normalize_lineshapes: bool,
    scale_resolution: usize,
}

impl AmplitudeModelBuilder {
    /// Start an empty model with unit efficiency and lineshape normalization enabled.
    pub fn new(kinematics: DecayKinematics) -> Self {
        Self {
            kinematics,
            parameters: Vec::new(),
            terms: Vec::new(),
            efficiency: Arc::new(ConstantEfficiency::unit()),
            normalize_lineshapes: true,
            scale_resolution: DEFAULT_SCALE_RESOLUTION,
        }
    }

    /// Add a parameter to the arena.
    pub fn add_parameter(&mut self, p: Parameter) -> Result<ParamId> {
        if !p.value.is_finite() {
            return Err(Error::Validation(format!("parameter '{}' value is not finite", p.name)));
        }
        if p.bounds.0.is_nan() || p.bounds.1.is_nan() || p.bounds.0 > p.bounds.1 {
            return Err(Error::Validation(format!(
                "parameter '{}' has invalid bounds {:?}",
                p.name, p.bounds
            )));
        }
        if self.parameters.iter().any(|q| q.name == p.name) {
            return Err(Error::Validation(format!("duplicate parameter name '{}'", p.name)));
        }
        self.parameters.push(p);
        Ok(ParamId(self.parameters.len() - 1))
    }

    /// Add `<prefix>_real` / `<prefix>_imag` parameters and return the coefficient.
    pub fn coefficient(
        &mut self,
        prefix: &str,
        value: Complex64,
        fixed: bool,
    ) -> Result<Coefficient> {
        let make = |suffix: &str, v: f64| {
            let name = format!("{prefix}_{suffix}");
            if fixed { Parameter::fixed(name, v) } else { Parameter::free(name, v, COEFFICIENT_BOUNDS) }
        };
        let re = self.add_parameter(make("real", value.re))?;
        let im = self.add_parameter(make("imag", value.im))?;
        Ok(Coefficient { re, im })
    }

    /// Coefficient from two existing arena parameters.
    pub fn coefficient_from(&self, re: ParamId, im: ParamId) -> Result<Coefficient> {
        for id in [re, im] {
            if id.0 >= self.parameters.len() {
                return Err(Error::Validation(format!("parameter id {} out of range", id.0)));
            }
        }
        Ok(Coefficient { re, im })
    }

    /// Append a resonance term.
    pub fn add_term(
        &mut self,
        name: impl Into<String>,
        lineshape: Lineshape,
        pair: DaughterPair,
        coefficient: Coefficient,
    ) -> Result<()> {
        let name = name.into();
        if self.terms.iter().any(|t| t.name == name) {
            return Err(Error::Validation(format!("duplicate resonance term '{name}'")));
        }
        self.coefficient_from(coefficient.re, coefficient.im)?;
        self.terms.push(ResonanceTerm { name, lineshape, pair, coefficient, scale: 1.0 });
        Ok(())
    }

    /// Replace the efficiency map.
    pub fn efficiency(&mut self, efficiency: Arc<dyn Efficiency>) -> &mut Self {
        self.efficiency = efficiency;
        self
    }

    /// Enable or disable per-term lineshape scales.
    pub fn normalize_lineshapes(&mut self, enabled: bool) -> &mut Self {
        self.normalize_lineshapes = enabled;
        self
    }

    /// Grid resolution for the lineshape scales.
    pub fn scale_resolution(&mut self, resolution: usize) -> &mut Self {
        self.scale_resolution = resolution;
        self
    }

    /// Finish the model.
    pub fn build(self) -> Result<AmplitudeModel> {
        if self.terms.is_empty() {
            return Err(Error::Validation("amplitude model requires at least one term".into()));
        }
        let mut model = AmplitudeModel {
            kinematics: self.kinematics,
            parameters: self.parameters,
            terms: self.terms,
            efficiency: self.efficiency,
            normalize_lineshapes: self.normalize_lineshapes,
            scale_resolution: self.scale_resolution,
        };
        model.refresh_term_scales()?;
        log::debug!(
            "built amplitude model: {} terms, {} parameters ({} free)",
            model.terms.len(),
            model.parameters.len(),
            model.free_slots().len()
        );
        Ok(model)
    }
}
