use crate::error::FitError;
use crate::nl_fit::data::Data;

use ndarray::Array1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the optimisation ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Converged,
    MaxIterations,
    Singular,
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Converged => "converged",
            Self::MaxIterations => "maximum number of iterations reached",
            Self::Singular => "singular normal equations",
        })
    }
}

/// Raw optimisation result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CurveFitResult {
    /// Best-fit free parameters
    pub x: Vec<f64>,
    /// Standard errors of `x` from the curvature matrix scaled by the reduced χ², if it could be
    /// inverted
    pub x_err: Option<Vec<f64>>,
    pub reduced_chi2: f64,
    pub success: bool,
    pub status: FitStatus,
    pub niterations: usize,
    /// Number of model evaluations
    pub nfev: usize,
    pub message: String,
}

pub trait CurveFitTrait {
    /// Minimise weighted squared residuals of `model` starting from `x0`
    ///
    /// `model(x, params)` evaluates the model on the whole abscissa array.
    fn curve_fit<F>(
        &self,
        data: &Data,
        x0: &[f64],
        bounds: (&[f64], &[f64]),
        model: F,
    ) -> Result<CurveFitResult, FitError>
    where
        F: Fn(&Array1<f64>, &[f64]) -> Array1<f64>;
}
