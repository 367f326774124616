//! # dp-amplitude
//!
//! Coherent-sum amplitude model of a three-body decay over its Dalitz plot.
//!
//! This crate provides:
//! - Decay kinematics and the physical-region test ([`DecayKinematics`]).
//! - Resonance lineshapes: relativistic Breit-Wigner, Gounaris-Sakurai, Flatté, non-resonant
//!   and a natural cubic spline through measured PWA knots ([`Lineshape`]).
//! - The amplitude model with shared complex coefficients ([`AmplitudeModel`]).
//! - Grid normalization and fit fractions ([`normalize()`], [`fit_fractions()`]).
//! - Seeded accept-reject toy generation ([`ToyGenerator`]).
//! - An ensemble likelihood implementing [`dp_core::traits::LogDensityModel`] for an external
//!   minimizer ([`DalitzLikelihood`]).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod efficiency;
pub mod event_store;
pub mod fit_fraction;
pub mod kinematics;
pub mod likelihood;
pub mod lineshape;
pub mod model;
pub mod normalize;
pub mod pwa;
pub mod spec;
pub mod toys;

pub use efficiency::{ConstantEfficiency, Efficiency, PolynomialEfficiency, PolynomialTerm};
pub use event_store::{Event, EventEnsemble};
pub use fit_fraction::FitFractionMatrix;
pub use kinematics::{DaughterPair, DecayKinematics, KinematicPoint, two_body_momentum};
pub use likelihood::DalitzLikelihood;
pub use lineshape::{BreitWigner, Flatte, GounarisSakurai, Lineshape, Spin, SplineWave};
pub use model::{
    AmplitudeModel, AmplitudeModelBuilder, Coefficient, FreeParameter, ParamId, Parameter,
    ResonanceTerm,
};
pub use normalize::{
    DEFAULT_GRID_RESOLUTION, IntegrationGrid, InterferenceIntegrals, fit_fractions,
    fit_fractions_on_grid, normalize, normalize_on_grid,
};
pub use pwa::{PwaKnot, PwaTable};
pub use spec::{DalitzModelSpecV0, build_model, compile_model, read_model_spec};
pub use toys::{GeneratorStats, ToyConfig, ToyGenerator, ToySample, generate};
