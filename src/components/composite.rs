use crate::components::attenuation::S07Attenuation;
use crate::components::blackbody::{Blackbody, ModifiedBlackbody};
use crate::components::component::{BoundedParam, Component, ComponentTrait};
use crate::components::drude::Drude;
use crate::components::gaussian::Gaussian;
use crate::error::{FitError, ParamInfoError};
use crate::nl_fit::{CurveFitResult, CurveFitTrait, Data};
use crate::param_info::ParamInfo;

use itertools::Itertools;
use ndarray::Array1;
use std::fmt;

/// Sum of emission components multiplied by the attenuation components
///
/// Parameters are addressed as `<component name>.<parameter name>`. Fixed parameters are kept
/// aside, the fitter sees only the free ones in the order of [CompositeModel::free_parameter_names].
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeModel {
    components: Vec<Component>,
}

impl CompositeModel {
    pub fn new(components: Vec<Component>) -> Result<Self, ParamInfoError> {
        if components.iter().all(|c| c.is_multiplicative()) {
            return Err(ParamInfoError::NoEmission);
        }
        Ok(Self { components })
    }

    /// Build components from parsed feature parameters
    ///
    /// Lines must have their widths set, see [ParamInfo::apply_instrument].
    pub fn from_param_info(info: &ParamInfo) -> Result<Self, ParamInfoError> {
        let mut components: Vec<Component> = vec![];
        components.extend(
            info.blackbodies
                .iter()
                .map(|bb| Component::from(Blackbody::new(&bb.name, bb.temperature, bb.tau))),
        );
        components.extend(
            info.modified_blackbodies
                .iter()
                .map(|bb| {
                    Component::from(ModifiedBlackbody::new(&bb.name, bb.temperature, bb.tau))
                }),
        );
        for line in &info.lines {
            let fwhm = line.fwhm.ok_or_else(|| ParamInfoError::MissingParameter {
                feature: line.name.clone(),
                parameter: "fwhm",
            })?;
            components.push(Gaussian::new(&line.name, line.wavelength, line.power, fwhm).into());
        }
        for feature in &info.dust_features {
            let fwhm = feature.fwhm.ok_or_else(|| ParamInfoError::MissingParameter {
                feature: feature.name.clone(),
                parameter: "fwhm",
            })?;
            components.push(
                Drude::new(&feature.name, feature.wavelength, feature.power, fwhm).into(),
            );
        }
        if let Some(attenuation) = &info.attenuation {
            components.push(
                S07Attenuation::new(&attenuation.name, attenuation.tau, attenuation.geometry)
                    .into(),
            );
        }
        Self::new(components)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name() == name)
    }

    fn emission(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|c| !c.is_multiplicative())
    }

    fn attenuation(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|c| c.is_multiplicative())
    }

    pub fn has_attenuation(&self) -> bool {
        self.attenuation().next().is_some()
    }

    /// Total transmission at `x`, unity without attenuation components
    pub fn transmission_at(&self, x: f64) -> f64 {
        self.attenuation().map(|c| c.evaluate(x)).product()
    }

    pub fn evaluate_at(&self, x: f64) -> f64 {
        self.emission().map(|c| c.evaluate(x)).sum::<f64>() * self.transmission_at(x)
    }

    pub fn evaluate(&self, x: &Array1<f64>) -> Array1<f64> {
        x.mapv(|x| self.evaluate_at(x))
    }

    /// Attenuated curves of every emission component, by component name
    pub fn component_curves(&self, x: &Array1<f64>) -> Vec<(String, Array1<f64>)> {
        let transmission = x.mapv(|x| self.transmission_at(x));
        self.emission()
            .map(|c| (c.name().to_owned(), x.mapv(|x| c.evaluate(x)) * &transmission))
            .collect()
    }

    /// Transmission curve, if the model has attenuation
    pub fn transmission_curve(&self, x: &Array1<f64>) -> Option<Array1<f64>> {
        self.has_attenuation()
            .then(|| x.mapv(|x| self.transmission_at(x)))
    }

    fn all_params(&self) -> impl Iterator<Item = (String, BoundedParam)> + '_ {
        self.components.iter().flat_map(|c| {
            c.param_names()
                .iter()
                .zip(c.params())
                .map(move |(param, value)| (format!("{}.{param}", c.name()), value))
        })
    }

    /// Names of all parameters, fixed included
    pub fn parameter_names(&self) -> Vec<String> {
        self.all_params().map(|(name, _)| name).collect()
    }

    /// All parameters by name, fixed included
    pub fn parameters(&self) -> Vec<(String, BoundedParam)> {
        self.all_params().collect()
    }

    pub fn free_parameter_names(&self) -> Vec<String> {
        self.all_params()
            .filter(|(_, p)| !p.fixed)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn n_free(&self) -> usize {
        self.all_params().filter(|(_, p)| !p.fixed).count()
    }

    pub fn free_values(&self) -> Vec<f64> {
        self.all_params()
            .filter(|(_, p)| !p.fixed)
            .map(|(_, p)| p.value)
            .collect()
    }

    /// Lower and upper bounds of the free parameters
    pub fn free_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.all_params()
            .filter(|(_, p)| !p.fixed)
            .map(|(_, p)| (p.lower(), p.upper()))
            .unzip()
    }

    /// Replace free parameter values, in the order of [CompositeModel::free_values]
    pub fn set_free_values(&mut self, values: &[f64]) {
        assert_eq!(
            values.len(),
            self.n_free(),
            "number of values must be equal to the number of free parameters"
        );
        let free = self
            .components
            .iter_mut()
            .flat_map(|c| c.params_mut())
            .filter(|p| !p.fixed);
        for (param, &value) in free.zip(values) {
            param.value = value;
        }
    }

    pub fn with_free_values(&self, values: &[f64]) -> Self {
        let mut model = self.clone();
        model.set_free_values(values);
        model
    }

    /// Fit free parameters to the data
    pub fn fit(&self, data: &Data, fitter: &impl CurveFitTrait) -> Result<FitResult, FitError> {
        let x0 = self.free_values();
        let (lower, upper) = self.free_bounds();
        log::info!(
            "fitting {} free parameters of {} components to {} points",
            x0.len(),
            self.components.len(),
            data.len()
        );
        let curve_fit = fitter.curve_fit(data, &x0, (&lower, &upper), |x, values| {
            self.with_free_values(values).evaluate(x)
        })?;
        Ok(FitResult {
            parameter_names: self.free_parameter_names(),
            model: self.with_free_values(&curve_fit.x),
            curve_fit,
        })
    }
}

/// Raw result of a fit together with the best-fit model
#[derive(Clone, Debug, PartialEq)]
pub struct FitResult {
    /// Names of the fitted parameters, in the order of `curve_fit.x`
    pub parameter_names: Vec<String>,
    pub model: CompositeModel,
    pub curve_fit: CurveFitResult,
}

impl FitResult {
    /// Best-fit value of a free parameter
    pub fn value(&self, parameter: &str) -> Option<f64> {
        self.parameter_names
            .iter()
            .position(|name| name == parameter)
            .map(|i| self.curve_fit.x[i])
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fit = &self.curve_fit;
        writeln!(f, "Fit status: {} ({})", fit.status, fit.message)?;
        writeln!(
            f,
            "reduced chi2 = {:.6}, iterations = {}, model evaluations = {}",
            fit.reduced_chi2, fit.niterations, fit.nfev
        )?;
        let width = self
            .parameter_names
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0);
        for (i, name) in self.parameter_names.iter().enumerate() {
            let error = fit
                .x_err
                .as_ref()
                .map(|err| format!(" ± {:.6e}", err[i]))
                .unwrap_or_default();
            writeln!(f, "{name:<width$} = {:.6e}{error}", fit.x[i])?;
        }
        let fixed = self
            .model
            .parameters()
            .into_iter()
            .filter(|(_, p)| p.fixed)
            .map(|(name, _)| name)
            .join(", ");
        if !fixed.is_empty() {
            writeln!(f, "fixed: {fixed}")?;
        }
        Ok(())
    }
}
