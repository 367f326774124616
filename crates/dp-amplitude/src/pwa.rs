//! Measured partial-wave (PWA) tables: knot positions with complex values.
//!
//! Text format, one knot per line: `edge  re  im`, whitespace separated. Blank lines and lines
//! starting with `#` are ignored. Each knot is stored in polar form (magnitude, phase in
//! radians) so the two components can be floated independently in a fit.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use dp_core::{Error, Result};

/// Allowed range for a floating knot magnitude.
pub const KNOT_MAGNITUDE_BOUNDS: (f64, f64) = (-100.0, 100.0);
/// Allowed range for a floating knot phase.
pub const KNOT_PHASE_BOUNDS: (f64, f64) = (-360.0, 360.0);

/// One spline knot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PwaKnot {
    /// Position in the pair invariant mass squared.
    pub edge: f64,
    /// `|value|`
    pub magnitude: f64,
    /// `arg(value)` in radians.
    pub phase: f64,
    /// Exclude the magnitude from the free parameters.
    #[serde(default)]
    pub magnitude_fixed: bool,
    /// Exclude the phase from the free parameters.
    #[serde(default)]
    pub phase_fixed: bool,
}

impl PwaKnot {
    /// Complex knot value.
    #[inline]
    pub fn value(&self) -> Complex64 {
        Complex64::from_polar(self.magnitude, self.phase)
    }
}

/// Ordered set of at least two knots with strictly increasing edges.
#[derive(Debug, Clone, PartialEq)]
pub struct PwaTable {
    knots: Vec<PwaKnot>,
}

impl PwaTable {
    /// Build a table from `(edge, re, im)` triples.
    pub fn from_cartesian<I>(triples: I) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, f64, f64)>,
    {
        let mut knots = Vec::new();
        for (i, (edge, re, im)) in triples.into_iter().enumerate() {
            if !(edge.is_finite() && re.is_finite() && im.is_finite()) {
                return Err(Error::Parse(format!(
                    "PWA knot {i} must be finite, got edge={edge}, re={re}, im={im}"
                )));
            }
            if let Some(prev) = knots.last().map(|k: &PwaKnot| k.edge)
                && prev >= edge
            {
                return Err(Error::Parse(format!(
                    "PWA edges must be strictly increasing, got edges[{}]={prev} and edges[{i}]={edge}",
                    i - 1
                )));
            }
            let value = Complex64::new(re, im);
            knots.push(PwaKnot {
                edge,
                magnitude: value.norm(),
                phase: value.arg(),
                magnitude_fixed: false,
                phase_fixed: false,
            });
        }
        if knots.len() < 2 {
            return Err(Error::Parse(format!(
                "PWA table requires at least 2 knots, got {}",
                knots.len()
            )));
        }
        Ok(Self { knots })
    }

    /// Parse the text format from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut triples = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(Error::Parse(format!(
                    "PWA line {}: expected 3 columns (edge re im), got {}",
                    lineno + 1,
                    fields.len()
                )));
            }
            let mut vals = [0.0f64; 3];
            for (v, field) in vals.iter_mut().zip(&fields) {
                *v = field.parse::<f64>().map_err(|e| {
                    Error::Parse(format!("PWA line {}: invalid number '{field}': {e}", lineno + 1))
                })?;
            }
            triples.push((vals[0], vals[1], vals[2]));
        }
        Self::from_cartesian(triples)
    }

    /// Parse the text format from a string.
    pub fn parse_str(text: &str) -> Result<Self> {
        Self::from_reader(text.as_bytes())
    }

    /// Read a PWA table file.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let table = Self::from_reader(BufReader::new(file))?;
        log::info!("loaded {} PWA knots from {}", table.len(), path.display());
        Ok(table)
    }

    /// Number of knots (always >= 2).
    pub fn len(&self) -> usize {
        self.knots.len()
    }

    /// Always false; kept for the `len` convention.
    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    /// Knots in edge order.
    pub fn knots(&self) -> &[PwaKnot] {
        &self.knots
    }

    pub(crate) fn knots_mut(&mut self) -> &mut [PwaKnot] {
        &mut self.knots
    }

    /// Knot edges.
    pub fn edges(&self) -> Vec<f64> {
        self.knots.iter().map(|k| k.edge).collect()
    }

    /// Complex knot values.
    pub fn values(&self) -> Vec<Complex64> {
        self.knots.iter().map(PwaKnot::value).collect()
    }

    /// `(first edge, last edge)`.
    pub fn range(&self) -> (f64, f64) {
        (self.knots[0].edge, self.knots[self.knots.len() - 1].edge)
    }

    /// Fix or release every knot magnitude and phase.
    pub fn set_all_fixed(&mut self, fixed: bool) {
        for k in &mut self.knots {
            k.magnitude_fixed = fixed;
            k.phase_fixed = fixed;
        }
    }

    /// Whether any knot component floats.
    pub fn has_free_knots(&self) -> bool {
        self.knots.iter().any(|k| !k.magnitude_fixed || !k.phase_fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let text = "# edge re im\n\n0.1 1.0 0.0\n  0.5  0.0 2.0 \n1.0 -1.0 0.0\n";
        let t = PwaTable::parse_str(text).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.range(), (0.1, 1.0));
        assert_relative_eq!(t.knots()[1].magnitude, 2.0, epsilon = 1e-15);
        assert_relative_eq!(t.knots()[1].phase, std::f64::consts::FRAC_PI_2, epsilon = 1e-15);
        let v = t.values()[2];
        assert_relative_eq!(v.re, -1.0, epsilon = 1e-15);
        assert_relative_eq!(v.im, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_wrong_column_count_reports_line() {
        let err = PwaTable::parse_str("0.1 1.0 0.0\n0.2 1.0\n").unwrap_err();
        match err {
            Error::Parse(msg) => assert!(msg.contains("line 2"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_and_non_monotonic_are_parse_errors() {
        assert!(matches!(PwaTable::parse_str("0.1 x 0.0\n0.2 1 0\n"), Err(Error::Parse(_))));
        assert!(matches!(PwaTable::parse_str("0.2 1 0\n0.2 1 0\n"), Err(Error::Parse(_))));
        assert!(matches!(PwaTable::parse_str("0.1 1 0\n"), Err(Error::Parse(_))));
        assert!(matches!(PwaTable::parse_str("0.1 nan 0\n0.2 1 0\n"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(PwaTable::read_file("/no/such/pwa.txt"), Err(Error::Io(_))));
    }
}
