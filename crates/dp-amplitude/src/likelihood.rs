//! Unbinned negative log-likelihood of an event ensemble under an amplitude model.
//!
//! `NLL(θ) = -Σ_e ln(D(e; θ) / I(θ))` where `D` is the model density and `I` its grid
//! integral over the physical region. Scaled lineshapes that do not depend on free parameters
//! are evaluated once per event and per grid cell; only coefficients (and floating spline
//! knots) are re-applied per call.

use std::sync::Arc;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::event_store::EventEnsemble;
use crate::model::{AmplitudeModel, FreeParameter};
use crate::normalize::{IntegrationGrid, check_integral, ordered_sum};
use dp_core::traits::{FixedParamModel, LogDensityModel, PreparedModelRef};
use dp_core::{Error, Result};

/// Grid resolution used by [`DalitzLikelihood::new`].
pub const DEFAULT_LIKELIHOOD_RESOLUTION: usize = 400;

/// Relative step of the central-difference gradient.
const FD_STEP: f64 = 1e-5;

/// Per-point scaled lineshapes (row-major `[point][term]`) and clamped efficiencies.
#[derive(Debug)]
struct WaveCache {
    n_terms: usize,
    waves: Vec<Complex64>,
    efficiency: Vec<f64>,
}

impl WaveCache {
    /// Cache static waves; entries of `dynamic` terms are left at zero.
    fn new(model: &AmplitudeModel, s12: &[f64], s13: &[f64], dynamic: &[usize]) -> Self {
        let n_terms = model.n_terms();
        let kin = model.kinematics();
        let zero = Complex64::new(0.0, 0.0);
        let mut waves = vec![zero; s12.len() * n_terms];
        if n_terms > 0 {
            waves.par_chunks_mut(n_terms).enumerate().for_each(|(i, row)| {
                model.waves_into(&kin.point(s12[i], s13[i]), row);
                for &k in dynamic {
                    row[k] = zero;
                }
            });
        }
        let efficiency = s12
            .par_iter()
            .zip(s13.par_iter())
            .map(|(&a, &b)| model.efficiency_at(a, b))
            .collect();
        Self { n_terms, waves, efficiency }
    }

    #[inline]
    fn density(&self, i: usize, coefs: &[Complex64], dynamic: &[(usize, Vec<Complex64>)]) -> f64 {
        let row = &self.waves[i * self.n_terms..(i + 1) * self.n_terms];
        let mut amp: Complex64 = row.iter().zip(coefs).map(|(w, c)| c * w).sum();
        for (k, column) in dynamic {
            amp += coefs[*k] * column[i];
        }
        amp.norm_sqr() * self.efficiency[i]
    }
}

/// Ensemble likelihood over the free parameters of an [`AmplitudeModel`].
#[derive(Debug, Clone)]
pub struct DalitzLikelihood {
    model: AmplitudeModel,
    parameters: Vec<FreeParameter>,
    dynamic_terms: Vec<usize>,
    events: Arc<EventEnsemble>,
    grid: Arc<IntegrationGrid>,
    event_cache: Arc<WaveCache>,
    grid_cache: Arc<WaveCache>,
}

impl DalitzLikelihood {
    /// Likelihood with a [`DEFAULT_LIKELIHOOD_RESOLUTION`] normalization grid.
    pub fn new(model: AmplitudeModel, events: Arc<EventEnsemble>) -> Result<Self> {
        let grid = IntegrationGrid::new(model.kinematics(), DEFAULT_LIKELIHOOD_RESOLUTION)?;
        Self::with_grid(model, events, Arc::new(grid))
    }

    /// Likelihood on an explicit normalization grid.
    ///
    /// Every event must lie inside the physical region.
    pub fn with_grid(
        model: AmplitudeModel,
        events: Arc<EventEnsemble>,
        grid: Arc<IntegrationGrid>,
    ) -> Result<Self> {
        if events.is_empty() {
            return Err(Error::Validation("likelihood requires at least one event".into()));
        }
        if let Some(i) = events.first_outside(model.kinematics()) {
            let e = events.get(i).map(|e| (e.index, e.s12, e.s13));
            return Err(Error::Validation(format!(
                "event {i} (index, s12, s13) = {e:?} lies outside the physical region"
            )));
        }
        if grid.is_empty() {
            return Err(Error::DegenerateNormalization(
                "integration grid has no cell inside the physical region".into(),
            ));
        }
        let dynamic_terms: Vec<usize> =
            (0..model.n_terms()).filter(|&k| model.term_has_free_shape(k)).collect();
        let event_cache = WaveCache::new(&model, events.s12(), events.s13(), &dynamic_terms);
        let grid_cache = WaveCache::new(&model, grid.s12(), grid.s13(), &dynamic_terms);
        log::debug!(
            "likelihood: {} events, {} grid cells, {} free parameters, {} floating lineshapes",
            events.len(),
            grid.len(),
            model.free_parameters().len(),
            dynamic_terms.len()
        );
        Ok(Self {
            parameters: model.free_parameters(),
            model,
            dynamic_terms,
            events,
            grid,
            event_cache: Arc::new(event_cache),
            grid_cache: Arc::new(grid_cache),
        })
    }

    /// Model at its construction-time parameters.
    pub fn model(&self) -> &AmplitudeModel {
        &self.model
    }

    /// Events.
    pub fn events(&self) -> &EventEnsemble {
        &self.events
    }

    /// Normalization grid.
    pub fn grid(&self) -> &IntegrationGrid {
        &self.grid
    }

    fn validate_params(&self, params: &[f64]) -> Result<()> {
        if params.len() != self.parameters.len() {
            return Err(Error::Validation(format!(
                "parameter length mismatch: expected {}, got {}",
                self.parameters.len(),
                params.len()
            )));
        }
        if let Some(i) = params.iter().position(|v| !v.is_finite()) {
            return Err(Error::Validation(format!(
                "parameter '{}' must be finite, got {}",
                self.parameters[i].name, params[i]
            )));
        }
        Ok(())
    }

    /// Copy of the model with `params` applied.
    pub fn model_at(&self, params: &[f64]) -> Result<AmplitudeModel> {
        self.validate_params(params)?;
        let mut model = self.model.clone();
        model.set_free_parameters(params)?;
        Ok(model)
    }

    fn dynamic_columns(
        &self,
        model: &AmplitudeModel,
        s12: &[f64],
        s13: &[f64],
    ) -> Vec<(usize, Vec<Complex64>)> {
        let kin = model.kinematics();
        self.dynamic_terms
            .iter()
            .map(|&k| {
                let term = &model.terms()[k];
                let column = s12
                    .par_iter()
                    .zip(s13.par_iter())
                    .map(|(&a, &b)| term.wave(kin, &kin.point(a, b)))
                    .collect();
                (k, column)
            })
            .collect()
    }

    /// Density integral `I(θ)` on the likelihood grid.
    pub fn normalization(&self, params: &[f64]) -> Result<f64> {
        let model = self.model_at(params)?;
        self.normalization_of(&model)
    }

    fn normalization_of(&self, model: &AmplitudeModel) -> Result<f64> {
        let coefs = model.coefficient_values();
        let dynamic = self.dynamic_columns(model, self.grid.s12(), self.grid.s13());
        let sum = ordered_sum(self.grid.len(), |g| self.grid_cache.density(g, &coefs, &dynamic));
        check_integral(sum * self.grid.cell_area(), "likelihood normalization")
    }

    fn nll_internal(&self, params: &[f64]) -> Result<f64> {
        let model = self.model_at(params)?;
        let norm = self.normalization_of(&model)?;

        let coefs = model.coefficient_values();
        let dynamic = self.dynamic_columns(&model, self.events.s12(), self.events.s13());
        let log_sum = ordered_sum(self.events.len(), |e| {
            self.event_cache.density(e, &coefs, &dynamic).max(f64::MIN_POSITIVE).ln()
        });
        Ok(self.events.len() as f64 * norm.ln() - log_sum)
    }
}

impl LogDensityModel for DalitzLikelihood {
    type Prepared<'a>
        = PreparedModelRef<'a, Self>
    where
        Self: 'a;

    fn dim(&self) -> usize {
        self.parameters.len()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.iter().map(|p| p.bounds).collect()
    }

    fn parameter_init(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.value).collect()
    }

    fn nll(&self, params: &[f64]) -> Result<f64> {
        self.nll_internal(params)
    }

    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.validate_params(params)?;
        (0..params.len())
            .into_par_iter()
            .map(|j| {
                let h = FD_STEP * (1.0 + params[j].abs());
                let mut p = params.to_vec();
                p[j] = params[j] + h;
                let up = self.nll_internal(&p)?;
                p[j] = params[j] - h;
                let down = self.nll_internal(&p)?;
                Ok((up - down) / (2.0 * h))
            })
            .collect()
    }

    fn prepared(&self) -> Self::Prepared<'_> {
        PreparedModelRef::new(self)
    }
}

impl FixedParamModel for DalitzLikelihood {
    fn with_fixed_param(&self, param_idx: usize, value: f64) -> Self {
        let mut m = self.clone();
        if let Some(p) = m.parameters.get_mut(param_idx) {
            p.value = value;
            p.bounds = (value, value);
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{DaughterPair, DecayKinematics};
    use crate::lineshape::{BreitWigner, Lineshape, Spin, SplineWave};
    use crate::model::AmplitudeModelBuilder;
    use crate::pwa::PwaTable;
    use crate::toys::generate;
    use approx::assert_relative_eq;

    fn model() -> AmplitudeModel {
        let mut b = AmplitudeModelBuilder::new(DecayKinematics::d_to_three_pions());
        let c = b.coefficient("rho", Complex64::new(1.0, 0.0), true).unwrap();
        let bw = BreitWigner::new(0.77526, 0.1478, Spin::P).unwrap();
        b.add_term("rho_12", Lineshape::BreitWigner(bw), DaughterPair::P12, c).unwrap();
        b.add_term("rho_13", Lineshape::BreitWigner(bw), DaughterPair::P13, c).unwrap();
        let nr = b.coefficient("nonres", Complex64::new(0.8, 0.3), false).unwrap();
        b.add_term("nonres", Lineshape::NonResonant, DaughterPair::P12, nr).unwrap();
        b.build().unwrap()
    }

    fn likelihood(n: usize) -> DalitzLikelihood {
        let m = model();
        let events = Arc::new(generate(&m, n, 2024).unwrap());
        let grid = Arc::new(IntegrationGrid::new(m.kinematics(), 150).unwrap());
        DalitzLikelihood::with_grid(m, events, grid).unwrap()
    }

    #[test]
    fn test_parameter_metadata_follows_model() {
        let l = likelihood(50);
        assert_eq!(l.dim(), 2);
        assert_eq!(l.parameter_names(), vec!["nonres_real", "nonres_imag"]);
        assert_eq!(l.parameter_init(), vec![0.8, 0.3]);
    }

    #[test]
    fn test_nll_matches_direct_evaluation() {
        let l = likelihood(200);
        let init = l.parameter_init();
        let nll = l.nll(&init).unwrap();

        let m = l.model_at(&init).unwrap();
        let norm = l.grid().integrate(|a, b| m.density(a, b));
        let direct: f64 = l.events().iter().map(|e| -(m.density(e.s12, e.s13) / norm).ln()).sum();
        assert_relative_eq!(nll, direct, max_relative = 1e-9);
    }

    #[test]
    fn test_nll_depends_on_floating_coefficient() {
        // Only the non-resonant coefficient floats; moving it changes the shape.
        let l = likelihood(200);
        let a = l.nll(&[0.8, 0.3]).unwrap();
        let b = l.nll(&[2.0, 0.3]).unwrap();
        assert!((a - b).abs() > 1e-6);
    }

    #[test]
    fn test_truth_is_preferred_over_a_distant_point() {
        let l = likelihood(3000);
        let truth = l.nll(&[0.8, 0.3]).unwrap();
        let far = l.nll(&[-2.5, 1.5]).unwrap();
        assert!(truth < far, "truth {truth} vs far {far}");
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let l = likelihood(300);
        let p = [0.7, 0.4];
        let g = l.grad_nll(&p).unwrap();
        let h = 1e-4;
        for j in 0..2 {
            let mut up = p;
            up[j] += h;
            let mut down = p;
            down[j] -= h;
            let fd = (l.nll(&up).unwrap() - l.nll(&down).unwrap()) / (2.0 * h);
            assert_relative_eq!(g[j], fd, epsilon = 1e-4, max_relative = 1e-3);
        }
    }

    #[test]
    fn test_fixed_param_pins_bounds() {
        let l = likelihood(50);
        let f = l.with_fixed_param(1, 0.0);
        assert_eq!(f.parameter_bounds()[1], (0.0, 0.0));
        assert_eq!(f.parameter_init()[1], 0.0);
        assert_eq!(f.dim(), l.dim());
    }

    #[test]
    fn test_rejects_events_outside_and_wrong_lengths() {
        let m = model();
        let mut events = EventEnsemble::new();
        events.push(0.6, 1.2);
        events.push(10.0, 10.0);
        assert!(DalitzLikelihood::new(m.clone(), Arc::new(events)).is_err());
        assert!(DalitzLikelihood::new(m, Arc::new(EventEnsemble::new())).is_err());

        let l = likelihood(20);
        assert!(l.nll(&[1.0]).is_err());
        assert!(l.nll(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_floating_spline_knots_are_recomputed_per_call() {
        let kin = DecayKinematics::d_to_three_pions();
        let mut b = AmplitudeModelBuilder::new(kin);
        let c = b.coefficient("swave", Complex64::new(1.0, 0.0), true).unwrap();
        let table =
            PwaTable::from_cartesian([(0.05, 1.0, 0.0), (1.0, 0.6, 0.6), (3.2, 0.2, 1.0)]).unwrap();
        b.add_term("swave", Lineshape::Spline(SplineWave::new(table)), DaughterPair::P12, c)
            .unwrap();
        let nr = b.coefficient("nonres", Complex64::new(0.5, 0.0), false).unwrap();
        b.add_term("nonres", Lineshape::NonResonant, DaughterPair::P12, nr).unwrap();
        let m = b.build().unwrap();

        let events = Arc::new(generate(&m, 200, 5).unwrap());
        let grid = Arc::new(IntegrationGrid::new(&kin, 120).unwrap());
        let l = DalitzLikelihood::with_grid(m, events, grid).unwrap();
        assert_eq!(l.dim(), 2 + 6);

        let mut p = l.parameter_init();
        let base = l.nll(&p).unwrap();
        p[4] *= 1.5; // knot 1 magnitude
        let moved = l.nll(&p).unwrap();
        assert!((moved - base).abs() > 1e-6);

        // Cached path agrees with a fresh evaluation of the moved model.
        let mm = l.model_at(&p).unwrap();
        let norm = l.grid().integrate(|a, c| mm.density(a, c));
        let direct: f64 =
            l.events().iter().map(|e| -(mm.density(e.s12, e.s13) / norm).ln()).sum();
        assert_relative_eq!(moved, direct, max_relative = 1e-9);
    }
}
