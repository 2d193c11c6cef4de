pub(super) use crate::features::BoundedParam;

use enum_dispatch::enum_dispatch;
pub(super) use macro_const::macro_const;
pub(super) use schemars::JsonSchema;
pub(super) use serde::{Deserialize, Serialize};

#[enum_dispatch]
pub trait ComponentTrait {
    /// Feature name the component was built from
    fn name(&self) -> &str;

    /// Parameter names, in the order of [ComponentTrait::params]
    fn param_names(&self) -> &'static [&'static str];

    fn params(&self) -> Vec<BoundedParam>;

    fn params_mut(&mut self) -> Vec<&mut BoundedParam>;

    /// Value at the rest-frame wavelength `x` in micron
    fn evaluate(&self, x: f64) -> f64;

    /// Multiplicative components scale the sum of the emission ones
    fn is_multiplicative(&self) -> bool {
        false
    }
}

/// All model components are available as variants of this enum
#[enum_dispatch(ComponentTrait)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[non_exhaustive]
pub enum Component {
    Blackbody(super::blackbody::Blackbody),
    ModifiedBlackbody(super::blackbody::ModifiedBlackbody),
    Drude(super::drude::Drude),
    Gaussian(super::gaussian::Gaussian),
    S07Attenuation(super::attenuation::S07Attenuation),
}
