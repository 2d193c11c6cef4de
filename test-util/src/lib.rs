pub use packs::{CLASSIC_PACK_YAML, MINIMAL_PACK_YAML, pack_path};
pub use spectra::{SyntheticSpectrum, noisy_spectrum};

mod packs;
mod spectra;
