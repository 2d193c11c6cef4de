mod spectrum;
pub use spectrum::{SpectralUnit, Spectrum};
