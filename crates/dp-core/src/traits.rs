//! Model traits shared between the amplitude engine and an external minimizer.
//!
//! The amplitude crate implements these traits for its ensemble likelihood; a fitter only
//! needs parameter metadata plus repeated NLL (and gradient) evaluations.

use crate::Result;

/// Prepared negative log-likelihood evaluator.
///
/// Models can precompute caches (normalization grids, fixed lineshape waves) once and reuse
/// them across repeated NLL evaluations. Minimizers should prefer `prepared().nll(...)`.
pub trait PreparedNll: Send + Sync {
    /// Compute negative log-likelihood at `params`.
    fn nll(&self, params: &[f64]) -> Result<f64>;
}

/// Default prepared wrapper that forwards to the model's `nll`.
#[derive(Debug, Clone, Copy)]
pub struct PreparedModelRef<'a, M: LogDensityModel + ?Sized> {
    model: &'a M,
}

impl<'a, M: LogDensityModel + ?Sized> PreparedModelRef<'a, M> {
    /// Create a new prepared wrapper that forwards `nll` to the model.
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }
}

impl<'a, M: LogDensityModel + ?Sized> PreparedNll for PreparedModelRef<'a, M> {
    fn nll(&self, params: &[f64]) -> Result<f64> {
        self.model.nll(params)
    }
}

/// Model interface consumed by maximum-likelihood drivers.
///
/// Parameter order is stable for the lifetime of the model: `parameter_names`,
/// `parameter_bounds`, `parameter_init` and the `params` slices all share it.
pub trait LogDensityModel: Send + Sync {
    /// Prepared evaluator type (can cache constants).
    ///
    /// If a model has nothing to cache, use:
    /// `type Prepared<'a> = PreparedModelRef<'a, Self> where Self: 'a;`
    type Prepared<'a>: PreparedNll + 'a
    where
        Self: 'a;

    /// Number of parameters.
    fn dim(&self) -> usize;

    /// Parameter names (stable order).
    fn parameter_names(&self) -> Vec<String>;

    /// Parameter bounds (min, max) (stable order).
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;

    /// Suggested initial values (stable order).
    fn parameter_init(&self) -> Vec<f64>;

    /// Negative log-likelihood.
    fn nll(&self, params: &[f64]) -> Result<f64>;

    /// Gradient of NLL.
    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>>;

    /// Create a prepared evaluator.
    fn prepared(&self) -> Self::Prepared<'_>;

    /// Compute NLL and gradient, optionally using prepared caches.
    ///
    /// The default implementation uses `prepared.nll(params)` and `self.grad_nll(params)`.
    fn nll_grad_prepared(
        &self,
        prepared: &Self::Prepared<'_>,
        params: &[f64],
    ) -> Result<(f64, Vec<f64>)> {
        Ok((prepared.nll(params)?, self.grad_nll(params)?))
    }
}

/// Optional extension: create a copy of the model with one parameter fixed.
///
/// Used for likelihood scans over a single coefficient.
pub trait FixedParamModel: Sized + Send + Sync {
    /// Return a copy with parameter `param_idx` fixed at `value` (bounds clamped).
    fn with_fixed_param(&self, param_idx: usize, value: f64) -> Self;
}
