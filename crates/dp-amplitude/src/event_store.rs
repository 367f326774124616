//! Columnar storage for Dalitz-plot events.
//!
//! Text format, one event per line: `index<TAB>s12<TAB>s13`. Values are written in shortest
//! round-trip form so a write/read cycle reproduces the ensemble exactly.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use dp_core::{Error, Result};

use crate::kinematics::DecayKinematics;

/// One event of an ensemble.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Sequential index.
    pub index: u64,
    /// `m²(12)`
    pub s12: f64,
    /// `m²(13)`
    pub s13: f64,
}

/// Ordered, append-only collection of events (Structure-of-Arrays).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventEnsemble {
    index: Vec<u64>,
    s12: Vec<f64>,
    s13: Vec<f64>,
}

impl EventEnsemble {
    /// Empty ensemble.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty ensemble with room for `n` events.
    pub fn with_capacity(n: usize) -> Self {
        Self { index: Vec::with_capacity(n), s12: Vec::with_capacity(n), s13: Vec::with_capacity(n) }
    }

    /// Build from columns of equal length; all values must be finite.
    pub fn from_columns(index: Vec<u64>, s12: Vec<f64>, s13: Vec<f64>) -> Result<Self> {
        if index.len() != s12.len() || index.len() != s13.len() {
            return Err(Error::Validation(format!(
                "event column length mismatch: index={}, s12={}, s13={}",
                index.len(),
                s12.len(),
                s13.len()
            )));
        }
        if let Some(i) = s12.iter().zip(&s13).position(|(a, b)| !(a.is_finite() && b.is_finite()))
        {
            return Err(Error::Validation(format!(
                "event {i} has non-finite invariants ({}, {})",
                s12[i], s13[i]
            )));
        }
        Ok(Self { index, s12, s13 })
    }

    /// Append an event with the next sequential index and return that index.
    pub fn push(&mut self, s12: f64, s13: f64) -> u64 {
        let next = self.index.last().map_or(0, |i| i + 1);
        self.index.push(next);
        self.s12.push(s12);
        self.s13.push(s13);
        next
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the ensemble is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Event `i`.
    pub fn get(&self, i: usize) -> Option<Event> {
        Some(Event { index: *self.index.get(i)?, s12: self.s12[i], s13: self.s13[i] })
    }

    /// Events in order.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        (0..self.len()).map(|i| Event { index: self.index[i], s12: self.s12[i], s13: self.s13[i] })
    }

    /// Index column.
    pub fn indices(&self) -> &[u64] {
        &self.index
    }

    /// `s12` column.
    pub fn s12(&self) -> &[f64] {
        &self.s12
    }

    /// `s13` column.
    pub fn s13(&self) -> &[f64] {
        &self.s13
    }

    /// Derived `s23` column.
    pub fn s23(&self, kin: &DecayKinematics) -> Vec<f64> {
        self.s12.iter().zip(&self.s13).map(|(&a, &b)| kin.derived_s23(a, b)).collect()
    }

    /// Position of the first event outside the physical region.
    pub fn first_outside(&self, kin: &DecayKinematics) -> Option<usize> {
        self.s12.iter().zip(&self.s13).position(|(&a, &b)| !kin.is_in_region(a, b))
    }

    /// Write the text format.
    pub fn write_text<W: Write>(&self, mut w: W) -> Result<()> {
        for e in self.iter() {
            writeln!(w, "{}\t{}\t{}", e.index, e.s12, e.s13)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Read the text format; blank lines are skipped.
    pub fn read_text<R: BufRead>(reader: R) -> Result<Self> {
        let mut out = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(Error::Parse(format!(
                    "event line {}: expected 3 columns (index s12 s13), got {}",
                    lineno + 1,
                    fields.len()
                )));
            }
            let bad = |what: &str, e: &dyn std::fmt::Display| {
                Error::Parse(format!("event line {}: invalid {what}: {e}", lineno + 1))
            };
            let index = fields[0].parse::<u64>().map_err(|e| bad("index", &e))?;
            let s12 = fields[1].parse::<f64>().map_err(|e| bad("s12", &e))?;
            let s13 = fields[2].parse::<f64>().map_err(|e| bad("s13", &e))?;
            if !(s12.is_finite() && s13.is_finite()) {
                return Err(Error::Parse(format!(
                    "event line {}: non-finite invariants ({s12}, {s13})",
                    lineno + 1
                )));
            }
            out.index.push(index);
            out.s12.push(s12);
            out.s13.push(s13);
        }
        Ok(out)
    }

    /// Write the text format to `path`.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.write_text(BufWriter::new(File::create(path)?))?;
        log::info!("wrote {} events to {}", self.len(), path.display());
        Ok(())
    }

    /// Read the text format from `path`.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let events = Self::read_text(BufReader::new(File::open(path)?))?;
        log::info!("read {} events from {}", events.len(), path.display());
        Ok(events)
    }
}
