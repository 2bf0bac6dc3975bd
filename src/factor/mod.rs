//! Factor analysis over an aligned collection.
//!
//! - `engine`: merge, clean, impute, standardize, fit, package
//! - `model`: the maximum-likelihood factor model itself

pub mod engine;
pub mod model;

pub use engine::{FactorRun, fit, fit_with};
pub use model::{FactorAnalysis, FittedFactorModel};
