//! Physical model components and their composition

mod attenuation;
pub use attenuation::{Geometry, S07Attenuation};

mod blackbody;
pub use blackbody::{Blackbody, ModifiedBlackbody};
pub(crate) use blackbody::{modified_planck, planck};

mod component;
pub use component::{Component, ComponentTrait};

mod composite;
pub use composite::{CompositeModel, FitResult};

mod drude;
pub use drude::Drude;

mod gaussian;
pub use gaussian::Gaussian;
