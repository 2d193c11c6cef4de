use crate::components::{CompositeModel, FitResult};
use crate::data::Spectrum;
use crate::error::ModelError;
use crate::features::Features;
use crate::instrument::{InstrumentName, InstrumentPack};
use crate::nl_fit::{Data, LmCurveFit};
use crate::param_info::ParamInfo;
use crate::plot::Figure;

use ndarray::Array1;
use std::path::Path;

/// Instrument name given to models read by [Model::from_saved]
pub const UNKNOWN_INSTRUMENT: &str = "unknown";

/// Number of wavelength points of a figure drawn without data
const PLOT_GRID_POINTS: usize = 1000;

/// Physical decomposition of a spectrum
///
/// A model stores what features are present and what their properties are, regardless of how
/// they are observed. The instrument and the redshift turn this description into a fittable
/// [CompositeModel] every time the model is guessed, fitted or plotted, so edits made to
/// [Model::features_mut] in between are always honoured.
///
/// Saving a model stores its features table only, the instrument and the redshift are not
/// round-tripped by [Model::save] and [Model::from_saved].
///
/// ```
/// use pahfit::{InstrumentName, Model};
///
/// let yaml = "PAH_11.3:\n  kind: dust_feature\n  wavelength: 11.33\n  fwhm: 0.36\n";
/// let features = pahfit::Features::from_definition_str(yaml).unwrap();
/// let model = Model::new(features, "spitzer.irs.sl.1", 0.0);
/// assert_eq!(model.instrument(), &InstrumentName::from("spitzer.irs.sl.1"));
/// assert!(model.fit_result().is_none());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    features: Features,
    instrument: InstrumentName,
    redshift: f64,
    instrument_pack: InstrumentPack,
    fit_result: Option<FitResult>,
}

impl Model {
    /// Model observed with the built-in instrument pack
    pub fn new(features: Features, instrument: impl Into<InstrumentName>, redshift: f64) -> Self {
        Self {
            features,
            instrument: instrument.into(),
            redshift,
            instrument_pack: InstrumentPack::builtin().clone(),
            fit_result: None,
        }
    }

    /// Model from a YAML feature definition file or a stored CSV or JSON table
    ///
    /// The format is chosen by [crate::TableFormat::from_path].
    pub fn from_definition(
        path: impl AsRef<Path>,
        instrument: impl Into<InstrumentName>,
        redshift: f64,
    ) -> Result<Self, ModelError> {
        let features = Features::read(path)?;
        Ok(Self::new(features, instrument, redshift))
    }

    /// Model from a table written by [Model::save]
    ///
    /// The instrument is set to [UNKNOWN_INSTRUMENT] and the redshift to zero, use
    /// [Model::set_instrument] and [Model::set_redshift] before guessing, fitting or plotting.
    pub fn from_saved(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let features = Features::read(path)?;
        log::warn!(
            "{} carries no instrument and redshift, using {UNKNOWN_INSTRUMENT:?} and 0",
            path.display()
        );
        Ok(Self::new(features, UNKNOWN_INSTRUMENT, 0.0))
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut Features {
        &mut self.features
    }

    pub fn instrument(&self) -> &InstrumentName {
        &self.instrument
    }

    pub fn set_instrument(&mut self, instrument: impl Into<InstrumentName>) {
        self.instrument = instrument.into();
    }

    pub fn redshift(&self) -> f64 {
        self.redshift
    }

    pub fn set_redshift(&mut self, redshift: f64) {
        self.redshift = redshift;
    }

    pub fn instrument_pack(&self) -> &InstrumentPack {
        &self.instrument_pack
    }

    /// Replace the built-in instrument pack
    pub fn set_instrument_pack(&mut self, pack: InstrumentPack) {
        self.instrument_pack = pack;
    }

    /// Raw result of the last fit
    pub fn fit_result(&self) -> Option<&FitResult> {
        self.fit_result.as_ref()
    }

    /// Estimate initial amplitudes from the flux of `spectrum`
    ///
    /// Writing the estimates back into the features table is not implemented yet, the call fails
    /// with [ModelError::NotImplemented] and leaves the table untouched.
    pub fn guess(&mut self, spectrum: &Spectrum) -> Result<(), ModelError> {
        let x = spectrum.rest_frame_micron(self.redshift)?;
        let mut info = self.param_info()?;
        info.estimate_init(&x, spectrum.flux());
        self.backport(&info)
    }

    /// Fit the model to `spectrum` weighted by its inverse uncertainty
    ///
    /// Convergence problems are not errors, they are reported by the solver status of
    /// [Model::fit_result]. The raw result is stored before the table update is attempted,
    /// which is not implemented yet and fails with [ModelError::NotImplemented].
    pub fn fit(
        &mut self,
        spectrum: &Spectrum,
        max_iterations: u32,
        verbose: bool,
    ) -> Result<(), ModelError> {
        self.fit_with(spectrum, &LmCurveFit::new(max_iterations, 1e-10, 1e-10), verbose)
    }

    /// [Model::fit] with an explicit solver configuration
    pub fn fit_with(
        &mut self,
        spectrum: &Spectrum,
        fitter: &LmCurveFit,
        verbose: bool,
    ) -> Result<(), ModelError> {
        let data = Data::new(
            spectrum.rest_frame_micron(self.redshift)?,
            spectrum.flux().clone(),
            spectrum.inv_err()?,
        )?;
        let model = self.construct_model()?;
        let result = model.fit(&data, fitter)?;
        log::info!(
            "fit finished: {} after {} iterations",
            result.curve_fit.status,
            result.curve_fit.niterations
        );
        if verbose {
            println!("{}", result.curve_fit.message);
        }
        self.fit_result = Some(result);
        self.parse_fit_result()
    }

    /// Model and optionally data and residuals in the rest frame
    ///
    /// Without a spectrum the model is evaluated over the wavelength range of the instrument.
    pub fn plot(&self, spectrum: Option<&Spectrum>) -> Result<Figure, ModelError> {
        let model = self.construct_model()?;
        let figure = match spectrum {
            Some(spectrum) => {
                let x = spectrum.rest_frame_micron(self.redshift)?;
                Figure::from_model(&model, &x, Some(spectrum.flux()), spectrum.uncertainty())
            }
            None => {
                let (min, max) = self.instrument_pack.wave_range(&self.instrument)?;
                let factor = 1.0 + self.redshift;
                let x = Array1::linspace(min / factor, max / factor, PLOT_GRID_POINTS);
                Figure::from_model(&model, &x, None, None)
            }
        };
        Ok(figure)
    }

    /// Independent copy, a starting point for further fits
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Write the features table, see [Features::write]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        self.features.write(path)?;
        Ok(())
    }

    /// Summary of the last fit
    pub fn report(&self) -> String {
        match &self.fit_result {
            Some(result) => result.to_string(),
            None => "no fit result".to_owned(),
        }
    }

    /// Print [Model::report]
    pub fn info(&self) {
        println!("{}", self.report());
    }

    fn param_info(&self) -> Result<ParamInfo, ModelError> {
        let mut info = ParamInfo::from_features(&self.features)?;
        info.apply_instrument(&self.instrument_pack, &self.instrument, self.redshift)?;
        Ok(info)
    }

    fn construct_model(&self) -> Result<CompositeModel, ModelError> {
        Ok(CompositeModel::from_param_info(&self.param_info()?)?)
    }

    fn backport(&mut self, _info: &ParamInfo) -> Result<(), ModelError> {
        Err(ModelError::NotImplemented(
            "writing estimated parameters into the features table",
        ))
    }

    fn parse_fit_result(&mut self) -> Result<(), ModelError> {
        Err(ModelError::NotImplemented(
            "writing fitted parameters into the features table",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SpectralUnit;
    use crate::error::{InstrumentError, SpectrumError, TableError};
    use crate::features::BoundedParam;
    use crate::tests::{init_logger, observed_spectrum};

    use approx::assert_relative_eq;
    use pahfit_test_util::{CLASSIC_PACK_YAML, MINIMAL_PACK_YAML, noisy_spectrum, pack_path};

    fn minimal() -> Model {
        let features = Features::from_definition_str(MINIMAL_PACK_YAML).unwrap();
        Model::new(features, "spitzer.irs.sl.1", 0.0)
    }

    fn set_value(model: &mut Model, feature: &str, param: &str, value: f64) {
        let row = model.features_mut().get_mut(feature).unwrap();
        let slot = row.param_slot_mut(param).unwrap();
        *slot = slot.map(|p| p.with_value(value));
    }

    /// Spectrum of the minimal pack with known amplitudes
    fn observed(redshift: f64) -> Spectrum {
        let mut truth = minimal();
        truth.set_redshift(redshift);
        set_value(&mut truth, "dust_cont", "tau", 3e-8);
        set_value(&mut truth, "NeII", "power", 2.0);
        set_value(&mut truth, "PAH_11.3", "power", 4.0);
        let composite = truth.construct_model().unwrap();
        let rest = noisy_spectrum(|x| composite.evaluate_at(x), 10.0, 13.5, 200, 0.01, 0.02, 42);
        observed_spectrum(rest, redshift)
    }

    #[test]
    fn from_definition() {
        let model =
            Model::from_definition(pack_path("classic.yaml"), "spitzer.irs.*", 0.01).unwrap();
        assert_eq!(model.features().len(), 27);
        assert_eq!(model.redshift(), 0.01);
        assert_eq!(model.instrument(), &InstrumentName::from("spitzer.irs.*"));
        assert!(matches!(
            Model::from_definition("pack.ecsv", "spitzer.irs.*", 0.0),
            Err(ModelError::Table(TableError::UnsupportedFormat(_)))
        ));
        assert!(matches!(
            Model::from_definition("/nonexistent/pack.yaml", "spitzer.irs.*", 0.0),
            Err(ModelError::Table(TableError::Io { .. }))
        ));
    }

    #[test]
    fn save_and_restore() {
        let model = Model::from_definition(pack_path("classic.yaml"), "spitzer.irs.*", 0.5).unwrap();
        let dir = tempfile::tempdir().unwrap();
        for file_name in ["model.csv", "model.json"] {
            let path = dir.path().join(file_name);
            model.save(&path).unwrap();
            let restored = Model::from_saved(&path).unwrap();
            assert_eq!(restored.features(), model.features());
            assert_eq!(restored.instrument(), &InstrumentName::from(UNKNOWN_INSTRUMENT));
            assert_eq!(restored.redshift(), 0.0);

            let reloaded = Model::from_definition(&path, "spitzer.irs.*", 0.5).unwrap();
            assert_eq!(reloaded, model);
        }
        assert!(matches!(
            model.save(dir.path().join("model.txt")),
            Err(ModelError::Table(TableError::UnsupportedFormat(_)))
        ));
    }

    #[test]
    fn copy_is_independent() {
        let model = Model::new(
            Features::from_definition_str(CLASSIC_PACK_YAML).unwrap(),
            "spitzer.irs.*",
            0.0,
        );
        let mut copy = model.copy();
        assert_eq!(copy, model);
        copy.features_mut().get_mut("[NeII]").unwrap().power = Some(BoundedParam::fixed(9.0));
        copy.set_redshift(1.0);
        assert_ne!(copy.features(), model.features());
        assert_eq!(
            model.features().get("[NeII]").unwrap().power,
            Some(BoundedParam::bounded(0.0, Some(0.0), None))
        );
        assert_eq!(model.redshift(), 0.0);
    }

    #[test]
    fn guess_is_not_written_back() {
        let mut model = minimal();
        let before = model.features().clone();
        assert!(matches!(
            model.guess(&observed(0.0)),
            Err(ModelError::NotImplemented(_))
        ));
        assert_eq!(model.features(), &before);
    }

    #[test]
    fn guess_checks_instrument() {
        let mut model = minimal();
        model.set_instrument("jwst.nirspec");
        assert!(matches!(
            model.guess(&observed(0.0)),
            Err(ModelError::Instrument(InstrumentError::UnknownInstrument(_)))
        ));
    }

    fn check_fit(redshift: f64) {
        init_logger();
        let mut model = minimal();
        model.set_redshift(redshift);
        set_value(&mut model, "dust_cont", "tau", 1e-8);
        set_value(&mut model, "NeII", "power", 1.0);
        set_value(&mut model, "PAH_11.3", "power", 1.0);
        let before = model.features().clone();

        assert!(matches!(
            model.fit(&observed(redshift), 1000, false),
            Err(ModelError::NotImplemented(_))
        ));
        assert_eq!(model.features(), &before);

        let result = model.fit_result().unwrap();
        assert!(result.curve_fit.success, "{result}");
        let tau = result.value("dust_cont.tau").unwrap();
        assert!((tau - 3e-8).abs() < 3e-9, "{tau}");
        let neii = result.value("NeII.power").unwrap();
        assert!((neii - 2.0).abs() < 0.2, "{neii}");
        let pah = result.value("PAH_11.3.power").unwrap();
        assert!((pah - 4.0).abs() < 0.2, "{pah}");
        assert!(model.report().starts_with("Fit status"));
    }

    #[test]
    fn fit_rest_frame() {
        check_fit(0.0);
    }

    #[test]
    fn fit_redshifted() {
        check_fit(0.05);
    }

    #[test]
    fn fit_requires_uncertainty() {
        let mut model = minimal();
        let observed = observed(0.0);
        let spectrum = Spectrum::new(
            observed.axis().clone(),
            SpectralUnit::Micron,
            observed.flux().clone(),
            None,
        )
        .unwrap();
        assert!(matches!(
            model.fit(&spectrum, 100, false),
            Err(ModelError::Spectrum(SpectrumError::MissingUncertainty))
        ));
        assert!(model.fit_result().is_none());
        assert_eq!(model.report(), "no fit result");
    }

    #[test]
    fn plot_is_pure() {
        let model = minimal();
        let before = model.clone();

        let figure = model.plot(None).unwrap();
        assert!(figure.lower.is_empty());
        let total = figure.upper.series("model").unwrap();
        assert_eq!(total.x.len(), PLOT_GRID_POINTS);
        assert_relative_eq!(total.x[0], 7.56);
        assert_relative_eq!(total.x[PLOT_GRID_POINTS - 1], 14.28);

        let figure = model.plot(Some(&observed(0.0))).unwrap();
        assert!(figure.upper.series("data").is_some());
        assert!(figure.lower.series("residual").is_some());
        assert_eq!(model, before);
    }

    #[test]
    fn plot_requires_known_instrument() {
        let mut model = minimal();
        model.set_instrument(UNKNOWN_INSTRUMENT);
        assert!(matches!(
            model.plot(None),
            Err(ModelError::Instrument(InstrumentError::UnknownInstrument(_)))
        ));
    }
}
