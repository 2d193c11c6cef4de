use std::path::PathBuf;

/// Error returned while reading, parsing or writing a [crate::Features] table
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed CSV table: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed JSON table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported table format {0:?}, supported extensions are yaml, yml, csv and json")]
    UnsupportedFormat(String),

    #[error("feature definition group {group:?}: {message}")]
    InvalidDefinition { group: String, message: String },

    #[error("feature {0:?} is defined more than once")]
    DuplicateName(String),

    #[error("invalid table: {0}")]
    Schema(String),

    #[error("cannot interpret bound {0:?}, expected a number, null, or a string ending in '#' or '%'")]
    InvalidBound(String),
}

impl TableError {
    pub(crate) fn definition(group: &str, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            group: group.to_owned(),
            message: message.into(),
        }
    }
}

/// Error returned by [crate::InstrumentPack] lookups
#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("no instrument segment matches {0:?}")]
    UnknownInstrument(String),

    #[error("wavelength {wavelength} micron is not covered by instrument {instrument}")]
    OutOfRange { instrument: String, wavelength: f64 },

    #[error("instrument segment {name:?}: {message}")]
    InvalidSegment { name: String, message: String },

    #[error("malformed instrument pack: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cannot read instrument pack {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error returned from [crate::Spectrum] constructors and conversions
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SpectrumError {
    #[error("spectrum is empty")]
    Empty,

    #[error("{name} has {actual} elements, but the spectral axis has {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("redshift must be larger than -1, got {0}")]
    InvalidRedshift(f64),

    #[error("spectrum has no uncertainty, it is required for weighting the fit")]
    MissingUncertainty,
}

/// Error returned when a fit cannot be set up
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FitError {
    #[error("x, y and inverse error arrays must have the same length, got {x}, {y} and {inv_err}")]
    LengthMismatch { x: usize, y: usize, inv_err: usize },

    #[error("uncertainty at index {index} is not a positive finite number")]
    InvalidUncertainty { index: usize },

    #[error("{points} data points are not enough to constrain {parameters} free parameters")]
    TooFewPoints { points: usize, parameters: usize },

    #[error("the model has no free parameters")]
    NoFreeParameters,

    #[error("invalid fitter configuration: {0}")]
    InvalidConfig(String),
}

/// Error returned when the features table cannot be turned into a model
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamInfoError {
    #[error("feature {feature:?} has no {parameter} parameter")]
    MissingParameter {
        feature: String,
        parameter: &'static str,
    },

    #[error("feature {feature:?}: unsupported attenuation model {model:?}")]
    UnsupportedAttenuation { feature: String, model: String },

    #[error("feature {feature:?}: unsupported attenuation geometry {geometry:?}")]
    UnsupportedGeometry { feature: String, geometry: String },

    #[error("only one attenuation feature is supported, got {0:?} and {1:?}")]
    MultipleAttenuation(String, String),

    #[error("model has no emission components")]
    NoEmission,
}

/// Error returned while rendering a [crate::Figure]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlotError {
    #[error("figure size {width}x{height} is too small")]
    InvalidSize { width: u32, height: u32 },

    #[error("rendering failed: {0}")]
    Render(String),
}

/// Error returned from [crate::Model] operations
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    ParamInfo(#[from] ParamInfoError),

    #[error(transparent)]
    Plot(#[from] PlotError),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}
