//! Toy event generation by accept-reject sampling of the model density.
//!
//! Candidates are drawn uniformly in the bounding rectangle of the Dalitz plot together with a
//! uniform height in `[0, D_max]`; a candidate is kept when it lies in the physical region and
//! its height does not exceed the density there. Candidate batches are drawn sequentially from
//! one seeded generator, their densities are evaluated in parallel, and acceptance is decided
//! in draw order, so the output depends only on the model and the seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event_store::EventEnsemble;
use crate::model::AmplitudeModel;
use crate::normalize::IntegrationGrid;
use dp_core::{Error, Result};

/// Accept-reject settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ToyConfig {
    /// Density bound. Taken from the grid scan (which always runs) when `None`.
    pub d_max: Option<f64>,
    /// Grid resolution of the bound scan.
    pub scan_resolution: usize,
    /// Factor applied to the scanned maximum, and to any density found above the bound.
    pub safety_factor: f64,
    /// Candidates evaluated per parallel batch.
    pub batch_size: usize,
    /// Warn when the observed acceptance falls below this fraction of the expected one.
    pub stall_ratio: f64,
    /// Give up after this many bound increases.
    pub max_bound_raises: u32,
}

impl Default for ToyConfig {
    fn default() -> Self {
        Self {
            d_max: None,
            scan_resolution: 400,
            safety_factor: 1.5,
            batch_size: 4096,
            stall_ratio: 0.1,
            max_bound_raises: 8,
        }
    }
}

/// Bookkeeping of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorStats {
    /// Candidates drawn in the final pass.
    pub candidates: u64,
    /// Candidates inside the physical region.
    pub in_region: u64,
    /// Accepted events.
    pub accepted: u64,
    /// Bound used in the final pass.
    pub d_max: f64,
    /// Acceptance the scanned bound (`max × safety_factor`) would give. Compared against
    /// the observed acceptance, so a supplied bound far above the scan shows up as a stall.
    pub expected_acceptance: f64,
    /// Times the bound was raised (each raise restarts from the seed).
    pub bound_raises: u32,
    /// Observed acceptance fell below `stall_ratio × expected`.
    pub stalled: bool,
}

impl GeneratorStats {
    /// `accepted / candidates`.
    pub fn acceptance(&self) -> f64 {
        if self.candidates == 0 { 0.0 } else { self.accepted as f64 / self.candidates as f64 }
    }
}

/// Output of [`ToyGenerator::run`].
#[derive(Debug, Clone)]
pub struct ToySample {
    /// Accepted events with sequential indices.
    pub events: EventEnsemble,
    /// Run statistics.
    pub stats: GeneratorStats,
}

/// Accept-reject sampler bound to one model.
#[derive(Debug)]
pub struct ToyGenerator<'a> {
    model: &'a AmplitudeModel,
    config: ToyConfig,
}

struct Bound {
    d_max: f64,
    expected_acceptance: f64,
}

impl<'a> ToyGenerator<'a> {
    /// Generator with default settings.
    pub fn new(model: &'a AmplitudeModel) -> Self {
        Self { model, config: ToyConfig::default() }
    }

    /// Generator with explicit settings.
    pub fn with_config(model: &'a AmplitudeModel, config: ToyConfig) -> Self {
        Self { model, config }
    }

    /// Settings.
    pub fn config(&self) -> &ToyConfig {
        &self.config
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(Error::Validation("toy batch_size must be > 0".into()));
        }
        if !(c.safety_factor.is_finite() && c.safety_factor > 1.0) {
            return Err(Error::Validation(format!(
                "toy safety_factor must be finite and > 1, got {}",
                c.safety_factor
            )));
        }
        if let Some(d) = c.d_max
            && !(d.is_finite() && d > 0.0)
        {
            return Err(Error::Validation(format!("toy d_max must be finite and > 0, got {d}")));
        }
        Ok(())
    }

    /// Scan the density on a grid. Runs even when `d_max` is supplied: an all-zero density
    /// is rejected up front instead of sampling forever.
    fn bound(&self) -> Result<Bound> {
        let kin = self.model.kinematics();
        let grid = IntegrationGrid::new(kin, self.config.scan_resolution)?;
        let densities = grid.densities(self.model);
        let max = densities.iter().copied().fold(0.0f64, f64::max);
        if !(max.is_finite() && max > 0.0) {
            return Err(Error::DegenerateNormalization(format!(
                "density maximum over the region is {max}; nothing to sample"
            )));
        }
        let scanned = max * self.config.safety_factor;
        // Mean density over the region times the in-region share of the rectangle.
        let [(lo12, hi12), (lo13, hi13)] = kin.bounding_box();
        let box_area = (hi12 - lo12) * (hi13 - lo13);
        let integral = densities.iter().sum::<f64>() * grid.cell_area();
        let expected_acceptance = integral / (box_area * scanned);
        let d_max = self.config.d_max.unwrap_or(scanned);
        log::debug!(
            "toy bound: scanned max {max}, d_max {d_max}, expected acceptance {expected_acceptance}"
        );
        Ok(Bound { d_max, expected_acceptance })
    }

    /// Generate exactly `count` events from `seed`.
    pub fn run(&self, count: usize, seed: u64) -> Result<ToySample> {
        self.validate_config()?;
        if count == 0 {
            return Ok(ToySample { events: EventEnsemble::new(), stats: GeneratorStats::default() });
        }
        let Bound { mut d_max, expected_acceptance } = self.bound()?;
        let mut bound_raises = 0u32;
        loop {
            match self.attempt(count, seed, d_max, expected_acceptance)? {
                Attempt::Done(events, mut stats) => {
                    stats.bound_raises = bound_raises;
                    log::info!(
                        "generated {} events from {} candidates (acceptance {:.4}, d_max {d_max})",
                        stats.accepted,
                        stats.candidates,
                        stats.acceptance()
                    );
                    return Ok(ToySample { events, stats });
                }
                Attempt::BoundExceeded(density) => {
                    if bound_raises >= self.config.max_bound_raises {
                        return Err(Error::Computation(format!(
                            "toy density {density} still exceeds d_max {d_max} after {bound_raises} raises"
                        )));
                    }
                    bound_raises += 1;
                    let raised = density * self.config.safety_factor;
                    log::warn!(
                        "toy density {density} exceeds d_max {d_max}; raising bound to {raised} and restarting"
                    );
                    d_max = raised;
                }
            }
        }
    }

    fn attempt(
        &self,
        count: usize,
        seed: u64,
        d_max: f64,
        expected_acceptance: f64,
    ) -> Result<Attempt> {
        let kin = self.model.kinematics();
        let [(lo12, hi12), (lo13, hi13)] = kin.bounding_box();
        let (w12, w13) = (hi12 - lo12, hi13 - lo13);
        let batch_size = self.config.batch_size;
        let stall_check_after = 16 * batch_size as u64;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut events = EventEnsemble::with_capacity(count);
        let mut stats = GeneratorStats { d_max, expected_acceptance, ..Default::default() };

        while events.len() < count {
            let batch: Vec<[f64; 3]> = (0..batch_size)
                .map(|_| {
                    [
                        lo12 + w12 * rng.random::<f64>(),
                        lo13 + w13 * rng.random::<f64>(),
                        d_max * rng.random::<f64>(),
                    ]
                })
                .collect();
            let densities: Vec<Option<f64>> = batch
                .par_iter()
                .map(|&[s12, s13, _]| {
                    kin.is_in_region(s12, s13).then(|| self.model.density(s12, s13))
                })
                .collect();

            for (&[s12, s13, height], density) in batch.iter().zip(densities) {
                stats.candidates += 1;
                let Some(density) = density else { continue };
                stats.in_region += 1;
                if !density.is_finite() {
                    return Err(Error::Computation(format!(
                        "non-finite density {density} at ({s12}, {s13})"
                    )));
                }
                if density > d_max {
                    return Ok(Attempt::BoundExceeded(density));
                }
                if height <= density && density > 0.0 {
                    events.push(s12, s13);
                    stats.accepted += 1;
                    if events.len() == count {
                        break;
                    }
                }
            }

            if !stats.stalled
                && stats.candidates >= stall_check_after
                && stats.acceptance() < self.config.stall_ratio * expected_acceptance
            {
                stats.stalled = true;
                log::warn!(
                    "toy acceptance {:.3e} is far below the expected {expected_acceptance:.3e} after {} candidates",
                    stats.acceptance(),
                    stats.candidates
                );
            }
        }
        Ok(Attempt::Done(events, stats))
    }
}

enum Attempt {
    Done(EventEnsemble, GeneratorStats),
    BoundExceeded(f64),
}

/// Generate `count` events with default settings.
pub fn generate(model: &AmplitudeModel, count: usize, seed: u64) -> Result<EventEnsemble> {
    Ok(ToyGenerator::new(model).run(count, seed)?.events)
}
