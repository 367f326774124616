//! # dp-core
//!
//! Core types, traits, and error handling for the Dalitz amplitude workspace.
//!
//! This crate provides:
//! - The common error type (parse / degenerate-normalization / validation failures)
//! - Model traits an external minimizer drives (`LogDensityModel`, `FixedParamModel`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;

pub use error::{Error, Result};
pub use traits::{FixedParamModel, LogDensityModel, PreparedModelRef, PreparedNll};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
