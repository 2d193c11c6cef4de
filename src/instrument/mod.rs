//! Instrument line-width resolution
//!
//! An instrument is a set of named spectral segments. Each segment covers a wavelength range and
//! has a resolving power `R(λ)`, the width of an unresolved line is `λ / R(λ)`.

mod name;
pub use name::InstrumentName;

mod pack;
pub use pack::{InstrumentPack, Segment};
