//! Fit-fraction matrix and its text / JSON reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::{InterferenceIntegrals, check_integral};
use dp_core::{Error, Result};

/// Symmetric `N×N` matrix of fit fractions.
///
/// Diagonal entries are the individual term fractions (each >= 0); off-diagonal entries carry
/// the interference and may be negative. All entries together sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFractionMatrix {
    names: Vec<String>,
    fractions: Vec<Vec<f64>>,
}

impl FitFractionMatrix {
    /// Divide the real part of every interference integral by the total.
    pub fn from_interference(
        names: Vec<String>,
        integrals: &InterferenceIntegrals,
    ) -> Result<Self> {
        let n = integrals.n_terms();
        if names.len() != n {
            return Err(Error::Validation(format!(
                "fit fraction names length mismatch: expected {n}, got {}",
                names.len()
            )));
        }
        let total = check_integral(integrals.total(), "amplitude")?;
        let fractions = (0..n)
            .map(|i| (0..n).map(|j| integrals.get(i, j).re / total).collect())
            .collect();
        Ok(Self { names, fractions })
    }

    /// Number of terms.
    pub fn n_terms(&self) -> usize {
        self.names.len()
    }

    /// Term names in matrix order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `FF_ij`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.fractions[i][j]
    }

    /// Row `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.fractions[i]
    }

    /// Individual term fractions.
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n_terms()).map(|i| self.fractions[i][i]).collect()
    }

    /// `Σ_i FF_ii`; differs from 1 by the net interference.
    pub fn diagonal_sum(&self) -> f64 {
        self.diagonal().iter().sum()
    }

    /// `Σ_ij FF_ij` (1 up to rounding).
    pub fn total(&self) -> f64 {
        self.fractions.iter().flatten().sum()
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for FitFractionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.names.iter().map(String::len).max().unwrap_or(0).max(4);
        write!(f, "{:width$}", "")?;
        for name in &self.names {
            write!(f, " {name:>width$}")?;
        }
        writeln!(f)?;
        for (name, row) in self.names.iter().zip(&self.fractions) {
            write!(f, "{name:width$}")?;
            for v in row {
                write!(f, " {v:>width$.6}")?;
            }
            writeln!(f)?;
        }
        write!(f, "Sum[i,i] = {:.6}", self.diagonal_sum())
    }
}
