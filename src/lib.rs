#![doc = include_str!("../README.md")]


mod array_stats;

pub mod components;
pub use components::{
    Blackbody, Component, ComponentTrait, CompositeModel, Drude, FitResult, Gaussian, Geometry,
    ModifiedBlackbody, S07Attenuation,
};

mod data;
pub use data::{SpectralUnit, Spectrum};

mod error;
pub use error::{
    FitError, InstrumentError, ModelError, ParamInfoError, PlotError, SpectrumError, TableError,
};

pub mod features;
pub use features::{BoundedParam, FeatureKind, FeatureRow, Features, TableFormat};

pub mod instrument;
pub use instrument::{InstrumentName, InstrumentPack, Segment};

mod model;
pub use model::{Model, UNKNOWN_INSTRUMENT};

pub mod nl_fit;
pub use nl_fit::{CurveFitResult, CurveFitTrait, Data, FitStatus, LmCurveFit};

mod param_info;
pub use param_info::{AttenuationInfo, ContinuumInfo, ParamInfo, ProfileInfo, STELLAR_TEMPERATURE};

pub mod plot;
pub use plot::Figure;

pub use ndarray;
