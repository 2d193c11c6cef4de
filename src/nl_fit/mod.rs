//! Non-linear least-squares fitting of spectral models
//!
//! The fitter sees only the free parameters of a model as a flat slice, packing and unpacking them
//! is done by [CompositeModel](crate::CompositeModel). Residuals are weighted by the inverse
//! uncertainty, so the minimised objective is
//!
//! ```text
//! χ² = Σ ((model(x_i, p) - y_i) / σ_i)²
//! ```
//!
//! Bounds are applied by clipping every trial step into the box, fixed parameters never reach the
//! fitter.

mod bounds;

pub mod curve_fit;
pub use curve_fit::{CurveFitResult, CurveFitTrait, FitStatus};

pub mod data;
pub use data::Data;

pub mod lm;
pub use lm::LmCurveFit;
