//! End-to-end checks on the D+ -> pi+ pi- pi+ fixture model: compile from YAML, generate toys,
//! store and reload them, evaluate the ensemble likelihood and report fit fractions.

use std::path::PathBuf;
use std::sync::Arc;

use dp_amplitude::spec::LineshapeSpec;
use dp_amplitude::{
    DalitzLikelihood, EventEnsemble, ToyConfig, ToyGenerator, compile_model, fit_fractions,
    normalize, read_model_spec,
};
use dp_core::LogDensityModel;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures").join(name)
}

fn load_model(fix_knots: bool) -> dp_amplitude::AmplitudeModel {
    let path = fixture("d2ppp_model.yaml");
    let mut spec = read_model_spec(&path).unwrap();
    for res in &mut spec.resonances {
        if let LineshapeSpec::Spline { fix_knots: f } = &mut res.lineshape {
            *f = fix_knots;
        }
    }
    compile_model(&spec, &path).unwrap()
}

#[test]
fn fixture_compiles_with_expected_terms_and_parameters() {
    let model = load_model(false);
    assert_eq!(model.n_terms(), 12);
    for name in ["rho770_12", "rho770_13", "f0_980_13", "nonres", "swave"] {
        assert!(model.term_index(name).is_some(), "missing term {name}");
    }

    let free = model.free_parameters();
    // five floating coefficients plus magnitude and phase of 20 knots
    assert_eq!(free.len(), 10 + 40);
    assert_eq!(free[0].name, "omega782_real");
    assert_eq!(free[10].name, "swave_knot_0_mag");
    assert_eq!(free[11].name, "swave_knot_0_phase");
    assert!(model.parameter("rho770_real").is_some_and(|p| p.fixed));

    let f0 = &model.terms()[model.term_index("f0_980_12").unwrap()];
    assert!((model.coefficient_value(f0.coefficient()).norm() - 2.0).abs() < 1e-12);
}

#[test]
fn fixture_density_is_physical() {
    let model = load_model(true);
    let kin = model.kinematics();
    let (lo, hi) = kin.s12_limits();
    assert_eq!(model.density(hi + 0.1, 1.0), 0.0);
    assert_eq!(model.density(lo - 0.01, 1.0), 0.0);

    let norm = normalize(&model, 600).unwrap();
    assert!(norm.is_finite() && norm > 0.0);
}

#[test]
fn toys_round_trip_through_text_file() {
    let model = load_model(true);
    let sample = ToyGenerator::new(&model).run(1500, 20_240_611).unwrap();
    assert_eq!(sample.events.len(), 1500);
    assert_eq!(sample.stats.accepted, 1500);
    assert!(sample.stats.acceptance() > 0.0 && sample.stats.acceptance() <= 1.0);
    assert!(sample.events.first_outside(model.kinematics()).is_none());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("toys.txt");
    sample.events.write_file(&path).unwrap();
    let back = EventEnsemble::read_file(&path).unwrap();
    assert_eq!(back, sample.events);
    assert_eq!(back.indices().first(), Some(&0));
    assert_eq!(back.indices().last(), Some(&1499));
}

#[test]
fn toys_are_reproducible_for_a_seed() {
    let model = load_model(true);
    let config = ToyConfig { scan_resolution: 200, ..ToyConfig::default() };
    let a = ToyGenerator::with_config(&model, config.clone()).run(300, 7).unwrap();
    let b = ToyGenerator::with_config(&model, config.clone()).run(300, 7).unwrap();
    let c = ToyGenerator::with_config(&model, config).run(300, 8).unwrap();
    assert_eq!(a.events, b.events);
    assert_eq!(a.stats, b.stats);
    assert_ne!(a.events, c.events);
}

#[test]
fn likelihood_prefers_generating_parameters() {
    let model = load_model(true);
    let events = ToyGenerator::new(&model).run(2000, 99).unwrap().events;
    let lik = DalitzLikelihood::new(model, Arc::new(events)).unwrap();

    assert_eq!(lik.dim(), 10);
    let names = lik.parameter_names();
    let truth = lik.parameter_init();
    let nll_truth = lik.nll(&truth).unwrap();
    assert!(nll_truth.is_finite());

    let i = names.iter().position(|n| n == "sigma_real").unwrap();
    let mut off = truth.clone();
    off[i] = 4.0;
    let nll_off = lik.nll(&off).unwrap();
    assert!(nll_off > nll_truth, "nll {nll_off} at sigma_real=4 vs {nll_truth} at truth");

    let prepared = lik.prepared();
    let (nll, grad) = lik.nll_grad_prepared(&prepared, &truth).unwrap();
    assert!((nll - nll_truth).abs() < 1e-9 * nll_truth.abs().max(1.0));
    assert_eq!(grad.len(), 10);
    assert!(grad.iter().all(|g| g.is_finite()));
}

#[test]
fn likelihood_rejects_events_outside_region() {
    let model = load_model(true);
    let mut events = EventEnsemble::new();
    events.push(0.5, 0.5);
    events.push(10.0, 10.0);
    let err = DalitzLikelihood::new(model, Arc::new(events)).unwrap_err();
    assert!(matches!(err, dp_core::Error::Validation(_)));
}

#[test]
fn fit_fraction_report_for_fixture() {
    let model = load_model(true);
    let ff = fit_fractions(&model, 400).unwrap();
    assert_eq!(ff.n_terms(), 12);
    assert!((ff.total() - 1.0).abs() < 1e-9);
    assert!(ff.diagonal().iter().all(|&v| v >= 0.0));

    // the two rho orientations mirror each other under s12 <-> s13
    let a = model.term_index("rho770_12").unwrap();
    let b = model.term_index("rho770_13").unwrap();
    let (fa, fb) = (ff.get(a, a), ff.get(b, b));
    assert!((fa - fb).abs() < 1e-3 * fa.max(fb), "{fa} vs {fb}");

    let report = ff.to_string();
    assert!(report.contains("swave"));
    assert!(report.contains("Sum[i,i] = "));

    let json: serde_json::Value = serde_json::from_str(&ff.to_json().unwrap()).unwrap();
    assert_eq!(json["names"].as_array().map(Vec::len), Some(12));
}
