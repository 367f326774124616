//! Detector efficiency `ε(s12, s13)` multiplying the amplitude density.

use serde::{Deserialize, Serialize};

use dp_core::{Error, Result};

/// Efficiency map over the Dalitz plot.
///
/// Values below zero are treated as zero by the density; values above one are allowed (only
/// the shape matters for a normalized likelihood).
pub trait Efficiency: Send + Sync + std::fmt::Debug {
    /// Efficiency at `(s12, s13)`.
    fn evaluate(&self, s12: f64, s13: f64) -> f64;
}

/// Uniform efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantEfficiency {
    value: f64,
}

impl ConstantEfficiency {
    /// Create a constant efficiency; must be finite and >= 0.
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::Validation(format!(
                "constant efficiency must be finite and >= 0, got {value}"
            )));
        }
        Ok(Self { value })
    }

    /// Unit efficiency.
    pub fn unit() -> Self {
        Self { value: 1.0 }
    }
}

impl Default for ConstantEfficiency {
    fn default() -> Self {
        Self::unit()
    }
}

impl Efficiency for ConstantEfficiency {
    #[inline]
    fn evaluate(&self, _s12: f64, _s13: f64) -> f64 {
        self.value
    }
}

/// One monomial `c · (s12 - x0)^i · (s13 - y0)^j`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolynomialTerm {
    /// Power of the shifted `s12`.
    pub s12_power: u32,
    /// Power of the shifted `s13`.
    pub s13_power: u32,
    /// Coefficient.
    pub coefficient: f64,
}

/// Two-dimensional polynomial efficiency in shifted invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialEfficiency {
    terms: Vec<PolynomialTerm>,
    offsets: [f64; 2],
}

impl PolynomialEfficiency {
    /// Create a polynomial efficiency; coefficients and offsets must be finite.
    pub fn new(terms: Vec<PolynomialTerm>, offsets: [f64; 2]) -> Result<Self> {
        if terms.is_empty() {
            return Err(Error::Validation("polynomial efficiency requires at least one term".into()));
        }
        for (i, t) in terms.iter().enumerate() {
            if !t.coefficient.is_finite() {
                return Err(Error::Validation(format!(
                    "polynomial efficiency term {i} coefficient must be finite, got {}",
                    t.coefficient
                )));
            }
        }
        if !(offsets[0].is_finite() && offsets[1].is_finite()) {
            return Err(Error::Validation(format!(
                "polynomial efficiency offsets must be finite, got {offsets:?}"
            )));
        }
        Ok(Self { terms, offsets })
    }

    /// Monomials.
    pub fn terms(&self) -> &[PolynomialTerm] {
        &self.terms
    }
}

impl Efficiency for PolynomialEfficiency {
    fn evaluate(&self, s12: f64, s13: f64) -> f64 {
        let x = s12 - self.offsets[0];
        let y = s13 - self.offsets[1];
        self.terms
            .iter()
            .map(|t| t.coefficient * x.powi(t.s12_power as i32) * y.powi(t.s13_power as i32))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polynomial_evaluates_shifted_monomials() {
        let eff = PolynomialEfficiency::new(
            vec![
                PolynomialTerm { s12_power: 0, s13_power: 0, coefficient: 1.0 },
                PolynomialTerm { s12_power: 1, s13_power: 0, coefficient: 0.5 },
                PolynomialTerm { s12_power: 1, s13_power: 2, coefficient: -0.25 },
            ],
            [1.0, 1.5],
        )
        .unwrap();
        // x = 1, y = -0.5
        assert_relative_eq!(eff.evaluate(2.0, 1.0), 1.0 + 0.5 - 0.25 * 0.25, epsilon = 1e-15);
    }

    #[test]
    fn test_constant_rejects_negative() {
        assert!(ConstantEfficiency::new(-0.1).is_err());
        assert_eq!(ConstantEfficiency::default().evaluate(0.3, 0.4), 1.0);
    }
}
