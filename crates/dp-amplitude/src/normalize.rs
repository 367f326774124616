//! Midpoint-grid quadrature over the physical Dalitz region.
//!
//! The bounding rectangle `[s12 limits] × [s13 limits]` is split into `resolution²` equal
//! cells; only cells whose centre lies inside the region are kept. Integrals are
//! `Σ f(centre) · cell_area`.
//!
//! Reductions run in parallel over fixed-size chunks and the per-chunk partial sums are added
//! in chunk order, so results are bit-identical across thread counts.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::fit_fraction::FitFractionMatrix;
use crate::kinematics::DecayKinematics;
use crate::model::AmplitudeModel;
use dp_core::{Error, Result};

/// Default number of cells per axis.
pub const DEFAULT_GRID_RESOLUTION: usize = 1500;

const CHUNK_SIZE: usize = 4096;

/// `Σ_{i<n} f(i)` with a thread-count independent summation order.
pub(crate) fn ordered_sum<F>(n: usize, f: F) -> f64
where
    F: Fn(usize) -> f64 + Sync + Send,
{
    let partials: Vec<f64> = (0..n.div_ceil(CHUNK_SIZE))
        .into_par_iter()
        .map(|c| {
            let lo = c * CHUNK_SIZE;
            let hi = (lo + CHUNK_SIZE).min(n);
            (lo..hi).map(&f).sum::<f64>()
        })
        .collect();
    partials.iter().sum()
}

/// Reject zero or non-finite normalization integrals.
pub(crate) fn check_integral(value: f64, what: &str) -> Result<f64> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::DegenerateNormalization(format!("{what} integral is {value}")));
    }
    Ok(value)
}

/// Cell centres of the physical region at a fixed resolution.
#[derive(Debug, Clone)]
pub struct IntegrationGrid {
    resolution: usize,
    cell_area: f64,
    s12: Vec<f64>,
    s13: Vec<f64>,
}

impl IntegrationGrid {
    /// Build the grid; `resolution` must be > 0.
    pub fn new(kin: &DecayKinematics, resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::Validation("integration grid resolution must be > 0".into()));
        }
        let [(lo12, hi12), (lo13, hi13)] = kin.bounding_box();
        let d12 = (hi12 - lo12) / resolution as f64;
        let d13 = (hi13 - lo13) / resolution as f64;

        let rows: Vec<Vec<(f64, f64)>> = (0..resolution)
            .into_par_iter()
            .map(|i| {
                let s12 = lo12 + (i as f64 + 0.5) * d12;
                (0..resolution)
                    .map(|j| (s12, lo13 + (j as f64 + 0.5) * d13))
                    .filter(|&(a, b)| kin.is_in_region(a, b))
                    .collect()
            })
            .collect();

        let n: usize = rows.iter().map(Vec::len).sum();
        let mut s12 = Vec::with_capacity(n);
        let mut s13 = Vec::with_capacity(n);
        for (a, b) in rows.into_iter().flatten() {
            s12.push(a);
            s13.push(b);
        }
        log::debug!("integration grid: {resolution}² cells, {n} inside the region");
        Ok(Self { resolution, cell_area: d12 * d13, s12, s13 })
    }

    /// Cells per axis.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Area of one cell.
    pub fn cell_area(&self) -> f64 {
        self.cell_area
    }

    /// Number of in-region cells.
    pub fn len(&self) -> usize {
        self.s12.len()
    }

    /// Whether no cell centre falls inside the region.
    pub fn is_empty(&self) -> bool {
        self.s12.is_empty()
    }

    /// `s12` of every in-region cell centre.
    pub fn s12(&self) -> &[f64] {
        &self.s12
    }

    /// `s13` of every in-region cell centre.
    pub fn s13(&self) -> &[f64] {
        &self.s13
    }

    /// Grid estimate of the region area.
    pub fn region_area(&self) -> f64 {
        self.len() as f64 * self.cell_area
    }

    /// `∫ f(s12, s13) dA` over the region.
    pub fn integrate<F>(&self, f: F) -> f64
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        ordered_sum(self.len(), |g| f(self.s12[g], self.s13[g])) * self.cell_area
    }

    /// Region average of `f`; NaN on an empty grid.
    pub fn mean<F>(&self, f: F) -> f64
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        self.integrate(f) / self.region_area()
    }

    /// Model density at every cell centre.
    pub fn densities(&self, model: &AmplitudeModel) -> Vec<f64> {
        self.s12.par_iter().zip(self.s13.par_iter()).map(|(&a, &b)| model.density(a, b)).collect()
    }

    /// Interference integrals `∫ A_i A_j* [ε] dA` with `A_k = c_k n_k L_k`.
    pub fn interference(
        &self,
        model: &AmplitudeModel,
        include_efficiency: bool,
    ) -> InterferenceIntegrals {
        let n = model.n_terms();
        let zero = Complex64::new(0.0, 0.0);
        let kin = model.kinematics();
        let coefs = model.coefficient_values();

        let partials: Vec<Vec<Complex64>> = (0..self.len().div_ceil(CHUNK_SIZE))
            .into_par_iter()
            .map(|c| {
                let mut acc = vec![zero; n * n];
                let mut amps = vec![zero; n];
                let lo = c * CHUNK_SIZE;
                let hi = (lo + CHUNK_SIZE).min(self.len());
                for g in lo..hi {
                    let (s12, s13) = (self.s12[g], self.s13[g]);
                    model.waves_into(&kin.point(s12, s13), &mut amps);
                    for (a, coef) in amps.iter_mut().zip(&coefs) {
                        *a *= *coef;
                    }
                    let w = if include_efficiency { model.efficiency_at(s12, s13) } else { 1.0 };
                    for i in 0..n {
                        for j in i..n {
                            acc[i * n + j] += amps[i] * amps[j].conj() * w;
                        }
                    }
                }
                acc
            })
            .collect();

        let mut values = vec![zero; n * n];
        for p in &partials {
            for (v, x) in values.iter_mut().zip(p) {
                *v += *x;
            }
        }
        for v in &mut values {
            *v *= self.cell_area;
        }
        for i in 0..n {
            for j in 0..i {
                values[i * n + j] = values[j * n + i].conj();
            }
        }
        InterferenceIntegrals { n, values }
    }
}

/// Hermitian matrix of pairwise term integrals.
#[derive(Debug, Clone, PartialEq)]
pub struct InterferenceIntegrals {
    n: usize,
    values: Vec<Complex64>,
}

impl InterferenceIntegrals {
    /// Number of terms.
    pub fn n_terms(&self) -> usize {
        self.n
    }

    /// `∫ A_i A_j*`.
    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        self.values[i * self.n + j]
    }

    /// `Σ_ij Re ∫ A_i A_j*`, i.e. `∫ |A|²`.
    pub fn total(&self) -> f64 {
        self.values.iter().map(|v| v.re).sum()
    }
}

/// `∫ density dA` over the physical region (efficiency included).
pub fn normalize(model: &AmplitudeModel, resolution: usize) -> Result<f64> {
    let grid = IntegrationGrid::new(model.kinematics(), resolution)?;
    normalize_on_grid(model, &grid)
}

/// [`normalize`] on a prebuilt grid.
pub fn normalize_on_grid(model: &AmplitudeModel, grid: &IntegrationGrid) -> Result<f64> {
    if grid.is_empty() {
        return Err(Error::DegenerateNormalization(
            "integration grid has no cell inside the physical region".into(),
        ));
    }
    check_integral(grid.integrate(|a, b| model.density(a, b)), "density")
}

/// Fit-fraction matrix `FF_ij = Re ∫ A_i A_j* / ∫ |A|²` (efficiency excluded).
pub fn fit_fractions(model: &AmplitudeModel, resolution: usize) -> Result<FitFractionMatrix> {
    let grid = IntegrationGrid::new(model.kinematics(), resolution)?;
    fit_fractions_on_grid(model, &grid)
}

/// [`fit_fractions`] on a prebuilt grid.
pub fn fit_fractions_on_grid(
    model: &AmplitudeModel,
    grid: &IntegrationGrid,
) -> Result<FitFractionMatrix> {
    let integrals = grid.interference(model, false);
    let names = model.terms().iter().map(|t| t.name().to_string()).collect();
    FitFractionMatrix::from_interference(names, &integrals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::DaughterPair;
    use crate::lineshape::Lineshape;
    use crate::model::AmplitudeModelBuilder;
    use approx::assert_relative_eq;

    fn flat_model() -> AmplitudeModel {
        let mut b = AmplitudeModelBuilder::new(DecayKinematics::d_to_three_pions());
        let c = b.coefficient("nonres", Complex64::new(1.0, 0.0), false).unwrap();
        b.add_term("nonres", Lineshape::NonResonant, DaughterPair::P12, c).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_ordered_sum_matches_sequential() {
        let n = 3 * CHUNK_SIZE + 17;
        let s = ordered_sum(n, |i| i as f64);
        assert_eq!(s, (n * (n - 1) / 2) as f64);
        assert_eq!(ordered_sum(0, |_| 1.0), 0.0);
    }

    #[test]
    fn test_grid_points_are_inside_the_region() {
        let kin = DecayKinematics::d_to_three_pions();
        let grid = IntegrationGrid::new(&kin, 100).unwrap();
        assert!(!grid.is_empty());
        for (&a, &b) in grid.s12().iter().zip(grid.s13()) {
            assert!(kin.is_in_region(a, b));
        }
        assert!(IntegrationGrid::new(&kin, 0).is_err());
    }

    #[test]
    fn test_flat_density_integrates_to_region_area() {
        let m = flat_model();
        let grid = IntegrationGrid::new(m.kinematics(), 300).unwrap();
        let norm = normalize_on_grid(&m, &grid).unwrap();
        assert_relative_eq!(norm, grid.region_area(), max_relative = 1e-12);
    }

    #[test]
    fn test_zero_coefficient_is_degenerate() {
        let mut m = flat_model();
        m.set_coefficient("nonres", Complex64::new(0.0, 0.0)).unwrap();
        assert!(matches!(normalize(&m, 50), Err(Error::DegenerateNormalization(_))));
        assert!(matches!(fit_fractions(&m, 50), Err(Error::DegenerateNormalization(_))));
    }

    #[test]
    fn test_interference_is_hermitian_and_sums_to_density_integral() {
        let mut b = AmplitudeModelBuilder::new(DecayKinematics::d_to_three_pions());
        let c1 = b.coefficient("a", Complex64::new(1.0, 0.3), false).unwrap();
        let c2 = b.coefficient("b", Complex64::new(-0.4, 0.8), false).unwrap();
        let bw = crate::lineshape::BreitWigner::new(1.2755, 0.1867, crate::lineshape::Spin::D)
            .unwrap();
        b.add_term("f2", Lineshape::BreitWigner(bw), DaughterPair::P12, c1).unwrap();
        b.add_term("nonres", Lineshape::NonResonant, DaughterPair::P12, c2).unwrap();
        let m = b.build().unwrap();

        let grid = IntegrationGrid::new(m.kinematics(), 200).unwrap();
        let ints = grid.interference(&m, true);
        assert_relative_eq!(ints.get(0, 1).re, ints.get(1, 0).re, epsilon = 1e-12);
        assert_relative_eq!(ints.get(0, 1).im, -ints.get(1, 0).im, epsilon = 1e-12);
        let direct = normalize_on_grid(&m, &grid).unwrap();
        assert_relative_eq!(ints.total(), direct, max_relative = 1e-10);
    }
}
