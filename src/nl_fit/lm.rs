use crate::error::FitError;
use crate::nl_fit::bounds::{clip_to_bounds, within_bounds};
use crate::nl_fit::curve_fit::{CurveFitResult, CurveFitTrait, FitStatus};
use crate::nl_fit::data::Data;

use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_FACTOR: f64 = 10.0;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// Levenberg-Marquardt non-linear least-squares solver
///
/// The Jacobian is approximated by forward differences with the step `sqrt(epsilon) * |p|`, or
/// `sqrt(epsilon)` for zero parameters, the step is taken backward when the forward one would
/// cross the upper bound. Trial steps solve the Marquardt-damped normal equations and are clipped
/// into the bounds, a step is accepted only if it reduces χ². Parameters lying on a bound with
/// the gradient pointing outside are excluded from the step.
///
/// The fit stops when an accepted step changes χ² or the parameter vector by a relative amount
/// smaller than `acc`, when χ² cannot be reduced by any damping, or after `niterations`
/// iterations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "Lm", into = "LmParameters", try_from = "LmParameters")]
pub struct LmCurveFit {
    pub niterations: u32,
    pub epsilon: f64,
    pub acc: f64,
}

impl LmCurveFit {
    /// Create a new [LmCurveFit]
    ///
    /// # Arguments
    /// - `niterations`: maximum number of iterations, every iteration computes a new Jacobian
    /// - `epsilon`: relative precision of the model evaluation, it defines the finite difference
    ///   step
    /// - `acc`: relative tolerance on χ² and parameter changes
    pub fn new(niterations: u32, epsilon: f64, acc: f64) -> Self {
        assert!(
            epsilon.is_finite() && epsilon > 0.0,
            "epsilon must be positive and finite"
        );
        assert!(acc.is_finite() && acc >= 0.0, "acc must be non-negative and finite");
        Self {
            niterations,
            epsilon,
            acc,
        }
    }

    /// Fallible version of [LmCurveFit::new]
    pub fn try_new(niterations: u32, epsilon: f64, acc: f64) -> Result<Self, FitError> {
        let fitter = Self {
            niterations,
            epsilon,
            acc,
        };
        fitter.validate()?;
        Ok(fitter)
    }

    /// Checked by [LmCurveFit::try_new], on deserialization and before every fit
    fn validate(&self) -> Result<(), FitError> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "epsilon must be positive and finite, got {}",
                self.epsilon
            )));
        }
        if !(self.acc.is_finite() && self.acc >= 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "acc must be non-negative and finite, got {}",
                self.acc
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn default_niterations() -> u32 {
        1000
    }

    #[inline]
    pub fn default_epsilon() -> f64 {
        f64::EPSILON.sqrt()
    }

    #[inline]
    pub fn default_acc() -> f64 {
        1e-7
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "Lm")]
struct LmParameters {
    #[serde(default = "LmCurveFit::default_niterations")]
    niterations: u32,
    #[serde(default = "LmCurveFit::default_epsilon")]
    epsilon: f64,
    #[serde(default = "LmCurveFit::default_acc")]
    acc: f64,
}

impl From<LmCurveFit> for LmParameters {
    fn from(f: LmCurveFit) -> Self {
        Self {
            niterations: f.niterations,
            epsilon: f.epsilon,
            acc: f.acc,
        }
    }
}

impl TryFrom<LmParameters> for LmCurveFit {
    type Error = FitError;

    fn try_from(p: LmParameters) -> Result<Self, Self::Error> {
        Self::try_new(p.niterations, p.epsilon, p.acc)
    }
}

impl Default for LmCurveFit {
    fn default() -> Self {
        Self::new(
            Self::default_niterations(),
            Self::default_epsilon(),
            Self::default_acc(),
        )
    }
}

/// Model evaluations with a counter
struct Problem<'a, F> {
    data: &'a Data,
    model: F,
    nfev: usize,
}

impl<F> Problem<'_, F>
where
    F: Fn(&Array1<f64>, &[f64]) -> Array1<f64>,
{
    fn residuals(&mut self, params: &[f64]) -> Array1<f64> {
        self.nfev += 1;
        self.data.residuals(&(self.model)(&self.data.x, params))
    }

    fn jacobian(
        &mut self,
        params: &[f64],
        residuals: &Array1<f64>,
        upper: &[f64],
        sqrt_epsilon: f64,
    ) -> DMatrix<f64> {
        let mut jacobian = DMatrix::zeros(residuals.len(), params.len());
        let mut shifted = params.to_vec();
        for (j, &p) in params.iter().enumerate() {
            let mut h = if p == 0.0 {
                sqrt_epsilon
            } else {
                sqrt_epsilon * p.abs()
            };
            if p + h > upper[j] {
                h = -h;
            }
            shifted[j] = p + h;
            // actual representable step
            let h = shifted[j] - p;
            let shifted_residuals = self.residuals(&shifted);
            shifted[j] = p;
            for (i, (&r1, &r0)) in shifted_residuals.iter().zip(residuals).enumerate() {
                jacobian[(i, j)] = (r1 - r0) / h;
            }
        }
        jacobian
    }
}

fn to_dvector(a: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(a.len(), a.iter().copied())
}

fn norm(x: &[f64]) -> f64 {
    x.iter().map(|x| x * x).sum::<f64>().sqrt()
}

impl LmCurveFit {
    fn uncertainties<F>(
        &self,
        problem: &mut Problem<F>,
        params: &[f64],
        residuals: &Array1<f64>,
        upper: &[f64],
        reduced_chi2: f64,
    ) -> Option<Vec<f64>>
    where
        F: Fn(&Array1<f64>, &[f64]) -> Array1<f64>,
    {
        let jacobian = problem.jacobian(params, residuals, upper, self.epsilon.sqrt());
        let covariance = (jacobian.transpose() * &jacobian).try_inverse()?;
        let errors: Vec<f64> = covariance
            .diagonal()
            .iter()
            .map(|&c| (c * reduced_chi2).sqrt())
            .collect();
        errors.iter().all(|e| e.is_finite()).then_some(errors)
    }
}

impl CurveFitTrait for LmCurveFit {
    fn curve_fit<F>(
        &self,
        data: &Data,
        x0: &[f64],
        bounds: (&[f64], &[f64]),
        model: F,
    ) -> Result<CurveFitResult, FitError>
    where
        F: Fn(&Array1<f64>, &[f64]) -> Array1<f64>,
    {
        self.validate()?;
        let nparams = x0.len();
        let npoints = data.len();
        if nparams == 0 {
            return Err(FitError::NoFreeParameters);
        }
        if npoints <= nparams {
            return Err(FitError::TooFewPoints {
                points: npoints,
                parameters: nparams,
            });
        }
        let (lower, upper) = bounds;
        assert_eq!(lower.len(), nparams, "lower bounds must match x0 length");
        assert_eq!(upper.len(), nparams, "upper bounds must match x0 length");

        let sqrt_epsilon = self.epsilon.sqrt();
        let dof = (npoints - nparams) as f64;
        let mut problem = Problem {
            data,
            model,
            nfev: 0,
        };

        let mut params = x0.to_vec();
        clip_to_bounds(&mut params, lower, upper);
        let mut residuals = problem.residuals(&params);
        let mut chi2 = residuals.dot(&residuals);
        if !chi2.is_finite() {
            log::warn!("model is not finite at the initial guess");
            return Ok(CurveFitResult {
                x: params,
                x_err: None,
                reduced_chi2: chi2 / dof,
                success: false,
                status: FitStatus::Singular,
                niterations: 0,
                nfev: problem.nfev,
                message: "model is not finite at the initial guess".to_owned(),
            });
        }

        let mut lambda = LAMBDA_INIT;
        let mut niterations = 0;
        let mut status = FitStatus::MaxIterations;
        let mut message = format!("maximum number of iterations ({}) reached", self.niterations);
        'iterations: while niterations < self.niterations as usize {
            niterations += 1;
            let jacobian = problem.jacobian(&params, &residuals, upper, sqrt_epsilon);
            let jacobian_t = jacobian.transpose();
            let mut alpha = &jacobian_t * &jacobian;
            let mut beta = -(&jacobian_t * to_dvector(&residuals));
            // parameters sitting on a bound and pushed outwards are frozen for this iteration
            for i in 0..nparams {
                let active = (params[i] >= upper[i] && beta[i] > 0.0)
                    || (params[i] <= lower[i] && beta[i] < 0.0);
                if active {
                    alpha.row_mut(i).fill(0.0);
                    alpha.column_mut(i).fill(0.0);
                    alpha[(i, i)] = 1.0;
                    beta[i] = 0.0;
                }
            }
            let diagonal_floor = (alpha.diagonal().max() * 1e-12).max(f64::MIN_POSITIVE);

            let mut solved = false;
            loop {
                let mut damped = alpha.clone();
                for i in 0..nparams {
                    damped[(i, i)] += lambda * alpha[(i, i)].max(diagonal_floor);
                }
                let step = damped
                    .cholesky()
                    .map(|cholesky| cholesky.solve(&beta))
                    .filter(|step| step.iter().all(|s| s.is_finite()));
                if let Some(step) = step {
                    solved = true;
                    let mut trial: Vec<f64> =
                        params.iter().zip(step.iter()).map(|(p, s)| p + s).collect();
                    clip_to_bounds(&mut trial, lower, upper);
                    let trial_residuals = problem.residuals(&trial);
                    let trial_chi2 = trial_residuals.dot(&trial_residuals);
                    if trial_chi2.is_finite() && trial_chi2 < chi2 {
                        let chi2_change = (chi2 - trial_chi2) / chi2;
                        let step_norm = norm(
                            &trial
                                .iter()
                                .zip(&params)
                                .map(|(t, p)| t - p)
                                .collect::<Vec<_>>(),
                        );
                        let small_step = step_norm <= self.acc * (norm(&params) + self.acc);
                        params = trial;
                        residuals = trial_residuals;
                        chi2 = trial_chi2;
                        lambda = (lambda / LAMBDA_FACTOR).max(LAMBDA_MIN);
                        log::trace!(
                            "LM iteration {niterations}: chi2 = {chi2}, lambda = {lambda}"
                        );
                        if chi2_change < self.acc {
                            status = FitStatus::Converged;
                            message = format!("relative chi2 change is below {}", self.acc);
                            break 'iterations;
                        }
                        if small_step {
                            status = FitStatus::Converged;
                            message = format!("relative parameter change is below {}", self.acc);
                            break 'iterations;
                        }
                        continue 'iterations;
                    }
                }
                lambda *= LAMBDA_FACTOR;
                if lambda > LAMBDA_MAX {
                    if solved {
                        status = FitStatus::Converged;
                        message = "chi2 cannot be reduced further".to_owned();
                    } else {
                        status = FitStatus::Singular;
                        message = "normal equations are singular".to_owned();
                    }
                    break 'iterations;
                }
            }
        }
        debug_assert!(within_bounds(&params, lower, upper));

        let reduced_chi2 = chi2 / dof;
        let x_err = self.uncertainties(&mut problem, &params, &residuals, upper, reduced_chi2);
        log::debug!(
            "LM finished after {niterations} iterations and {} evaluations: {status}, {message}, reduced chi2 = {reduced_chi2}",
            problem.nfev
        );
        Ok(CurveFitResult {
            x: params,
            x_err,
            reduced_chi2,
            success: status == FitStatus::Converged,
            status,
            niterations,
            nfev: problem.nfev,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::init_logger;

    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    fn nonlinear_func(t: &Array1<f64>, param: &[f64]) -> Array1<f64> {
        t.mapv(|t| param[1] * f64::exp(-param[0] * t) * t.powi(2) + param[2])
    }

    #[test]
    fn nonlinear() {
        init_logger();

        const N: usize = 300;
        const NOISE: f64 = 0.5;

        let param_true = [0.75, 2.0, 0.5];
        let param_init = [1.0, 1.0, 1.0];

        let mut rng = StdRng::seed_from_u64(0);

        let t = Array1::linspace(0.0, 10.0, N);
        let y = nonlinear_func(&t, &param_true).mapv(|y| {
            let eps: f64 = rng.sample(StandardNormal);
            y + NOISE * eps
        });
        let inv_err: Array1<_> = vec![1.0 / NOISE; N].into();
        let data = Data::new(t, y, inv_err).unwrap();

        let fitter = LmCurveFit::default();
        let result = fitter
            .curve_fit(
                &data,
                &param_init,
                (&[0.0, 0.0, -10.0], &[10.0, 10.0, 10.0]),
                nonlinear_func,
            )
            .unwrap();

        assert!(result.success, "{}", result.message);
        assert_abs_diff_eq!(&result.x[..], &param_true[..], epsilon = 0.1);
        assert_abs_diff_eq!(result.reduced_chi2, 1.0, epsilon = 0.3);
        let x_err = result.x_err.unwrap();
        for ((x, err), truth) in result.x.iter().zip(&x_err).zip(&param_true) {
            assert!((x - truth).abs() < 5.0 * err, "{x} ± {err} vs {truth}");
        }
        assert!(result.nfev > result.niterations);
    }

    #[test]
    fn bounded_slope() {
        const N: usize = 20;
        let x = Array1::linspace(0.0, 1.0, N);
        let y = x.mapv(|x| 1.0 + 2.0 * x);
        let data = Data::new(x, y, Array1::ones(N)).unwrap();
        let line = |x: &Array1<f64>, p: &[f64]| x.mapv(|x| p[0] + p[1] * x);

        let result = LmCurveFit::default()
            .curve_fit(
                &data,
                &[0.0, 0.0],
                (&[f64::NEG_INFINITY, f64::NEG_INFINITY], &[f64::INFINITY, 1.0]),
                line,
            )
            .unwrap();
        assert!(result.success, "{}", result.message);
        assert_abs_diff_eq!(result.x[1], 1.0, epsilon = 1e-12);
        // best intercept for the unit slope is the mean residual
        assert_abs_diff_eq!(result.x[0], 1.5, epsilon = 1e-6);
    }

    #[test]
    fn exact_data() {
        const N: usize = 10;
        let x = Array1::linspace(1.0, 2.0, N);
        let y = x.mapv(|x| 3.0 * x);
        let data = Data::new(x, y, Array1::ones(N)).unwrap();
        let result = LmCurveFit::new(100, 1e-10, 1e-10)
            .curve_fit(
                &data,
                &[1.0],
                (&[f64::NEG_INFINITY], &[f64::INFINITY]),
                |x: &Array1<f64>, p: &[f64]| x * p[0],
            )
            .unwrap();
        assert_eq!(result.status, FitStatus::Converged);
        assert_abs_diff_eq!(result.x[0], 3.0, epsilon = 1e-8);
    }

    #[test]
    fn iteration_cap() {
        const N: usize = 50;
        let x = Array1::linspace(0.0, 10.0, N);
        let y = nonlinear_func(&x, &[0.75, 2.0, 0.5]);
        let data = Data::new(x, y, Array1::ones(N)).unwrap();
        let result = LmCurveFit::new(1, 1e-10, 0.0)
            .curve_fit(
                &data,
                &[2.0, 0.5, 0.0],
                (&[0.0; 3], &[10.0; 3]),
                nonlinear_func,
            )
            .unwrap();
        assert_eq!(result.niterations, 1);
        assert_eq!(result.status, FitStatus::MaxIterations);
        assert!(!result.success);
    }

    #[test]
    fn non_finite_start() {
        let data = Data::new(Array1::linspace(0.0, 1.0, 5), Array1::zeros(5), Array1::ones(5))
            .unwrap();
        let result = LmCurveFit::default()
            .curve_fit(
                &data,
                &[0.0],
                (&[f64::NEG_INFINITY], &[f64::INFINITY]),
                |x: &Array1<f64>, p: &[f64]| x.mapv(|x| p[0] / x),
            )
            .unwrap();
        assert_eq!(result.status, FitStatus::Singular);
        assert!(!result.success);
    }

    #[test]
    fn invalid_setup() {
        let data = Data::new(Array1::zeros(2), Array1::zeros(2), Array1::ones(2)).unwrap();
        let model = |x: &Array1<f64>, _p: &[f64]| x.clone();
        let fitter = LmCurveFit::default();
        assert_eq!(
            fitter.curve_fit(&data, &[], (&[], &[]), model),
            Err(FitError::NoFreeParameters)
        );
        assert_eq!(
            fitter.curve_fit(&data, &[0.0, 0.0], (&[0.0; 2], &[1.0; 2]), model),
            Err(FitError::TooFewPoints {
                points: 2,
                parameters: 2
            })
        );
    }

    #[test]
    fn config_serde() {
        let fitter = LmCurveFit::new(10, 1e-10, 1e-10);
        let json = serde_json::to_string(&fitter).unwrap();
        let restored: LmCurveFit = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, fitter);

        let partial: LmCurveFit = serde_json::from_str(r#"{"niterations": 5}"#).unwrap();
        assert_eq!(partial.epsilon, LmCurveFit::default_epsilon());
    }

    #[test]
    fn invalid_config() {
        for json in [
            r#"{"niterations": 10, "epsilon": 0.0, "acc": 1e-10}"#,
            r#"{"niterations": 10, "epsilon": -1e-10, "acc": 1e-10}"#,
            r#"{"niterations": 10, "epsilon": 1e-10, "acc": -1.0}"#,
        ] {
            assert!(serde_json::from_str::<LmCurveFit>(json).is_err(), "{json}");
        }
        assert!(matches!(
            LmCurveFit::try_new(10, f64::NAN, 1e-10),
            Err(FitError::InvalidConfig(_))
        ));

        let mut fitter = LmCurveFit::default();
        fitter.epsilon = 0.0;
        let x = Array1::linspace(0.0, 1.0, 10);
        let data = Data::new(x.clone(), x, Array1::ones(10)).unwrap();
        assert!(matches!(
            fitter.curve_fit(
                &data,
                &[1.0],
                (&[-10.0], &[10.0]),
                |x: &Array1<f64>, p: &[f64]| x * p[0],
            ),
            Err(FitError::InvalidConfig(_))
        ));
    }
}
