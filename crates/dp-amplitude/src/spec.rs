//! Dalitz model spec v0 parsing + compilation into [`AmplitudeModel`]s.
//!
//! A spec lists the decay, an optional efficiency map, an optional PWA table file and the
//! resonances. A resonance listing several daughter pairs expands into one term per pair,
//! all sharing the resonance coefficient.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use num_complex::Complex64;
use serde::Deserialize;

use crate::efficiency::{ConstantEfficiency, Efficiency, PolynomialEfficiency, PolynomialTerm};
use crate::kinematics::{DEFAULT_MESON_RADIUS, DaughterPair, DecayKinematics};
use crate::lineshape::{BreitWigner, Flatte, GounarisSakurai, Lineshape, Spin, SplineWave};
use crate::model::{AmplitudeModel, AmplitudeModelBuilder};
use crate::pwa::PwaTable;

pub const DALITZ_MODEL_V0: &str = "dalitz_model_v0";

#[derive(Debug, Clone, Deserialize)]
pub struct DalitzModelSpecV0 {
    #[serde(rename = "$schema")]
    #[allow(dead_code)]
    pub schema_uri: Option<String>,
    pub schema_version: String,
    pub decay: DecaySpec,
    #[serde(default = "default_true")]
    pub normalize_lineshapes: bool,
    #[serde(default)]
    pub efficiency: Option<EfficiencySpec>,
    /// PWA table used by spline resonances, relative to the spec file.
    #[serde(default)]
    pub pwa_file: Option<PathBuf>,
    pub resonances: Vec<ResonanceSpec>,
}

fn default_true() -> bool {
    true
}

fn default_meson_radius() -> f64 {
    DEFAULT_MESON_RADIUS
}

fn default_pairs() -> Vec<DaughterPair> {
    vec![DaughterPair::P12]
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecaySpec {
    pub mother_mass: f64,
    pub daughter_masses: [f64; 3],
    #[serde(default = "default_meson_radius")]
    pub meson_radius: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EfficiencySpec {
    Constant {
        value: f64,
    },
    Polynomial {
        terms: Vec<PolynomialTerm>,
        #[serde(default)]
        offsets: [f64; 2],
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResonanceSpec {
    pub name: String,
    #[serde(default = "default_pairs")]
    pub pairs: Vec<DaughterPair>,
    #[serde(default)]
    pub coefficient: CoefficientSpec,
    pub lineshape: LineshapeSpec,
}

/// Complex coefficient, cartesian or polar (phase in radians).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CoefficientSpec {
    Cartesian {
        real: f64,
        #[serde(default)]
        imag: f64,
        #[serde(default)]
        fixed: bool,
    },
    Polar {
        magnitude: f64,
        phase: f64,
        #[serde(default)]
        fixed: bool,
    },
}

impl Default for CoefficientSpec {
    fn default() -> Self {
        CoefficientSpec::Cartesian { real: 1.0, imag: 0.0, fixed: false }
    }
}

impl CoefficientSpec {
    fn value(&self) -> Complex64 {
        match *self {
            CoefficientSpec::Cartesian { real, imag, .. } => Complex64::new(real, imag),
            CoefficientSpec::Polar { magnitude, phase, .. } => {
                Complex64::from_polar(magnitude, phase)
            }
        }
    }

    fn fixed(&self) -> bool {
        match *self {
            CoefficientSpec::Cartesian { fixed, .. } => fixed,
            CoefficientSpec::Polar { fixed, .. } => fixed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineshapeSpec {
    Rbw {
        mass: f64,
        width: f64,
        spin: Spin,
    },
    GounarisSakurai {
        mass: f64,
        width: f64,
        spin: Spin,
    },
    Flatte {
        mass: f64,
        g_pipi: f64,
        g_kk: f64,
    },
    NonResonant,
    Spline {
        #[serde(default)]
        fix_knots: bool,
    },
}

impl LineshapeSpec {
    fn compile(&self, pwa: Option<&PwaTable>) -> dp_core::Result<Lineshape> {
        Ok(match *self {
            LineshapeSpec::Rbw { mass, width, spin } => {
                Lineshape::BreitWigner(BreitWigner::new(mass, width, spin)?)
            }
            LineshapeSpec::GounarisSakurai { mass, width, spin } => {
                Lineshape::GounarisSakurai(GounarisSakurai::new(mass, width, spin)?)
            }
            LineshapeSpec::Flatte { mass, g_pipi, g_kk } => {
                Lineshape::Flatte(Flatte::new(mass, g_pipi, g_kk)?)
            }
            LineshapeSpec::NonResonant => Lineshape::NonResonant,
            LineshapeSpec::Spline { fix_knots } => {
                let mut table = pwa.cloned().ok_or_else(|| {
                    dp_core::Error::Validation(
                        "spline lineshape requires a PWA table, none was supplied".into(),
                    )
                })?;
                table.set_all_fixed(fix_knots);
                Lineshape::Spline(SplineWave::new(table))
            }
        })
    }
}

/// Read and schema-check a model spec (YAML or JSON).
pub fn read_model_spec(path: &Path) -> Result<DalitzModelSpecV0> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let spec: DalitzModelSpecV0 = serde_yaml_ng::from_slice(&bytes).with_context(|| {
        format!("failed to parse Dalitz model spec (YAML/JSON) from {}", path.display())
    })?;

    if spec.schema_version != DALITZ_MODEL_V0 {
        anyhow::bail!(
            "unsupported schema_version: {} (expected {})",
            spec.schema_version,
            DALITZ_MODEL_V0
        );
    }
    Ok(spec)
}

/// Assemble a model from a parsed spec and an optional, already loaded PWA table.
///
/// Fails with no partial model on any invalid entry.
pub fn build_model(
    spec: &DalitzModelSpecV0,
    pwa: Option<&PwaTable>,
) -> dp_core::Result<AmplitudeModel> {
    use dp_core::Error;

    let d = &spec.decay;
    let kin = DecayKinematics::new(d.mother_mass, d.daughter_masses, d.meson_radius)?;
    let mut builder = AmplitudeModelBuilder::new(kin);
    builder.normalize_lineshapes(spec.normalize_lineshapes);

    if let Some(eff) = &spec.efficiency {
        let eff: Arc<dyn Efficiency> = match eff {
            EfficiencySpec::Constant { value } => Arc::new(ConstantEfficiency::new(*value)?),
            EfficiencySpec::Polynomial { terms, offsets } => {
                Arc::new(PolynomialEfficiency::new(terms.clone(), *offsets)?)
            }
        };
        builder.efficiency(eff);
    }

    if spec.resonances.is_empty() {
        return Err(Error::Validation("model spec: resonances must be non-empty".into()));
    }
    for res in &spec.resonances {
        if res.pairs.is_empty() {
            return Err(Error::Validation(format!("resonance '{}' lists no pairs", res.name)));
        }
        if matches!(res.lineshape, LineshapeSpec::Spline { .. }) && res.pairs.len() != 1 {
            return Err(Error::Validation(format!(
                "spline resonance '{}' must couple to exactly one pair",
                res.name
            )));
        }
        let lineshape = res
            .lineshape
            .compile(pwa)
            .map_err(|e| Error::Validation(format!("resonance '{}': {e}", res.name)))?;
        let coefficient =
            builder.coefficient(&res.name, res.coefficient.value(), res.coefficient.fixed())?;
        for &pair in &res.pairs {
            let name = if res.pairs.len() == 1 {
                res.name.clone()
            } else {
                format!("{}_{}", res.name, pair.label())
            };
            builder.add_term(name, lineshape.clone(), pair, coefficient)?;
        }
    }

    let model = builder.build()?;
    log::info!(
        "built Dalitz model: {} resonances, {} terms, {} free parameters",
        spec.resonances.len(),
        model.n_terms(),
        model.free_parameters().len()
    );
    Ok(model)
}

/// Compile a spec read from `spec_path`, loading its PWA table relative to the spec file.
pub fn compile_model(spec: &DalitzModelSpecV0, spec_path: &Path) -> Result<AmplitudeModel> {
    let base_dir = spec_path.parent().unwrap_or_else(|| Path::new("."));
    let pwa = match &spec.pwa_file {
        Some(file) => {
            let path = if file.is_absolute() { file.clone() } else { base_dir.join(file) };
            let table = PwaTable::read_file(&path)
                .with_context(|| format!("failed to load PWA table {}", path.display()))?;
            Some(table)
        }
        None => None,
    };
    build_model(spec, pwa.as_ref())
        .with_context(|| format!("failed to compile Dalitz model from {}", spec_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
schema_version: dalitz_model_v0
decay:
  mother_mass: 1.86959
  daughter_masses: [0.13957018, 0.13957018, 0.13957018]
resonances:
  - name: rho770
    pairs: [p12, p13]
    coefficient: { real: 1.0, imag: 0.0, fixed: true }
    lineshape: { type: gounaris_sakurai, mass: 0.77526, width: 0.1478, spin: 1 }
  - name: f0_980
    pairs: [p12, p13]
    coefficient: { magnitude: 2.0, phase: 0.5 }
    lineshape: { type: flatte, mass: 0.965, g_pipi: 0.165, g_kk: 0.69465 }
  - name: nonres
    lineshape: { type: non_resonant }
"#;

    fn parse(text: &str) -> DalitzModelSpecV0 {
        serde_yaml_ng::from_str(text).unwrap()
    }

    #[test]
    fn test_pairs_expand_into_terms_sharing_a_coefficient() {
        let m = build_model(&parse(SPEC), None).unwrap();
        assert_eq!(m.n_terms(), 5);
        assert_eq!(m.terms()[0].name(), "rho770_12");
        assert_eq!(m.terms()[1].name(), "rho770_13");
        assert_eq!(m.terms()[0].coefficient(), m.terms()[1].coefficient());
        assert_eq!(m.terms()[4].name(), "nonres");

        let names: Vec<String> = m.free_parameters().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["f0_980_real", "f0_980_imag", "nonres_real", "nonres_imag"]);
        let f0 = m.coefficient_value(m.terms()[2].coefficient());
        assert!((f0.norm() - 2.0).abs() < 1e-12);
        assert!((f0.arg() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_spline_without_table_is_rejected() {
        let text = SPEC.replace("type: non_resonant", "type: spline");
        let err = build_model(&parse(&text), None).unwrap_err();
        assert!(err.to_string().contains("nonres"), "{err}");
    }

    #[test]
    fn test_spline_uses_supplied_table_and_fix_flag() {
        let text = SPEC.replace("type: non_resonant", "type: spline, fix_knots: true");
        let table = PwaTable::from_cartesian([(0.05, 1.0, 0.0), (1.5, 0.5, 0.5), (3.2, 0.0, 1.0)])
            .unwrap();
        let m = build_model(&parse(&text), Some(&table)).unwrap();
        assert!(m.terms()[4].lineshape().spline().is_some());
        assert!(!m.term_has_free_shape(4));
    }

    #[test]
    fn test_bad_physics_values_are_validation_errors() {
        let text = SPEC.replace("spin: 1", "spin: 3");
        assert!(serde_yaml_ng::from_str::<DalitzModelSpecV0>(&text).is_err());

        let text = SPEC.replace("width: 0.1478", "width: -0.1");
        assert!(matches!(
            build_model(&parse(&text), None),
            Err(dp_core::Error::Validation(_))
        ));

        let text = SPEC.replace("mother_mass: 1.86959", "mother_mass: 0.3");
        assert!(build_model(&parse(&text), None).is_err());
    }

    #[test]
    fn test_wrong_schema_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.yaml");
        std::fs::write(&path, SPEC.replace("dalitz_model_v0", "dalitz_model_v9")).unwrap();
        let err = read_model_spec(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported schema_version"));
    }

    #[test]
    fn test_compile_resolves_pwa_file_relative_to_spec() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("swave.txt"), "0.05 1 0\n1.5 0.5 0.5\n3.2 0 1\n").unwrap();
        let text = format!(
            "{}pwa_file: swave.txt\n",
            SPEC.replace("type: non_resonant", "type: spline")
        );
        let path = dir.path().join("model.yaml");
        std::fs::write(&path, text).unwrap();
        let spec = read_model_spec(&path).unwrap();
        let m = compile_model(&spec, &path).unwrap();
        assert_eq!(m.free_parameters().len(), 4 + 6);
    }
}
