//! Table of spectral features and its file formats

pub mod definition;

mod param;
pub use param::BoundedParam;

mod row;
pub use row::{FeatureKind, FeatureRow};

mod saved;

mod table;
pub use table::{Features, TableFormat};
