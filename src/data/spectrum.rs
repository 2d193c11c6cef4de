use crate::error::SpectrumError;

use ndarray::Array1;
use ndarray_stats::QuantileExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Speed of light in micron per second
const SPEED_OF_LIGHT: f64 = 2.997_924_58e14;

/// Unit of the spectral axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpectralUnit {
    Micron,
    Nanometer,
    Angstrom,
    Hertz,
    Gigahertz,
}

impl SpectralUnit {
    /// Convert a single axis value to wavelength in micron
    pub fn to_micron(&self, value: f64) -> f64 {
        match self {
            Self::Micron => value,
            Self::Nanometer => value * 1e-3,
            Self::Angstrom => value * 1e-4,
            Self::Hertz => SPEED_OF_LIGHT / value,
            Self::Gigahertz => SPEED_OF_LIGHT / (value * 1e9),
        }
    }

    pub fn is_frequency(&self) -> bool {
        matches!(self, Self::Hertz | Self::Gigahertz)
    }
}

/// Observed one-dimensional spectrum
///
/// Frequency axes are converted point by point, so the resulting wavelength grid decreases.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    axis: Array1<f64>,
    unit: SpectralUnit,
    flux: Array1<f64>,
    uncertainty: Option<Array1<f64>>,
}

impl Spectrum {
    /// Construct a spectrum, all arrays must have the same non-zero length
    pub fn new(
        axis: impl Into<Array1<f64>>,
        unit: SpectralUnit,
        flux: impl Into<Array1<f64>>,
        uncertainty: Option<Array1<f64>>,
    ) -> Result<Self, SpectrumError> {
        let axis = axis.into();
        let flux = flux.into();
        if axis.is_empty() {
            return Err(SpectrumError::Empty);
        }
        if flux.len() != axis.len() {
            return Err(SpectrumError::LengthMismatch {
                name: "flux",
                expected: axis.len(),
                actual: flux.len(),
            });
        }
        if let Some(uncertainty) = &uncertainty {
            if uncertainty.len() != axis.len() {
                return Err(SpectrumError::LengthMismatch {
                    name: "uncertainty",
                    expected: axis.len(),
                    actual: uncertainty.len(),
                });
            }
        }
        Ok(Self {
            axis,
            unit,
            flux,
            uncertainty,
        })
    }

    /// Spectrum with the wavelength axis in micron
    pub fn from_micron(
        wavelength: impl Into<Array1<f64>>,
        flux: impl Into<Array1<f64>>,
        uncertainty: Option<Array1<f64>>,
    ) -> Result<Self, SpectrumError> {
        Self::new(wavelength, SpectralUnit::Micron, flux, uncertainty)
    }

    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }

    pub fn axis(&self) -> &Array1<f64> {
        &self.axis
    }

    pub fn unit(&self) -> SpectralUnit {
        self.unit
    }

    pub fn flux(&self) -> &Array1<f64> {
        &self.flux
    }

    pub fn uncertainty(&self) -> Option<&Array1<f64>> {
        self.uncertainty.as_ref()
    }

    /// Observed-frame wavelength in micron
    pub fn wavelength_micron(&self) -> Array1<f64> {
        self.axis.mapv(|x| self.unit.to_micron(x))
    }

    /// Rest-frame wavelength in micron, observed wavelength divided by `1 + z`
    pub fn rest_frame_micron(&self, redshift: f64) -> Result<Array1<f64>, SpectrumError> {
        if !redshift.is_finite() || redshift <= -1.0 {
            return Err(SpectrumError::InvalidRedshift(redshift));
        }
        Ok(self.wavelength_micron() / (1.0 + redshift))
    }

    /// Inverse uncertainty, used as fit weights
    pub fn inv_err(&self) -> Result<Array1<f64>, SpectrumError> {
        self.uncertainty
            .as_ref()
            .map(|uncertainty| uncertainty.mapv(f64::recip))
            .ok_or(SpectrumError::MissingUncertainty)
    }

    /// Minimum and maximum of the flux, NaN values are ignored
    pub fn flux_range(&self) -> (f64, f64) {
        (*self.flux.min_skipnan(), *self.flux.max_skipnan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn unit_conversion() {
        assert_relative_eq!(SpectralUnit::Nanometer.to_micron(5000.0), 5.0);
        assert_relative_eq!(SpectralUnit::Angstrom.to_micron(50000.0), 5.0);
        assert_relative_eq!(SpectralUnit::Hertz.to_micron(2.997_924_58e13), 10.0);
        assert_relative_eq!(SpectralUnit::Gigahertz.to_micron(2.997_924_58e4), 10.0);
        assert!(SpectralUnit::Gigahertz.is_frequency());
        assert!(!SpectralUnit::Angstrom.is_frequency());
    }

    #[test]
    fn validation() {
        assert_eq!(
            Spectrum::from_micron(Array1::<f64>::zeros(0), Array1::<f64>::zeros(0), None),
            Err(SpectrumError::Empty)
        );
        assert_eq!(
            Spectrum::from_micron(array![1.0, 2.0], array![1.0], None),
            Err(SpectrumError::LengthMismatch {
                name: "flux",
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            Spectrum::from_micron(array![1.0, 2.0], array![1.0, 1.0], Some(array![0.1])),
            Err(SpectrumError::LengthMismatch {
                name: "uncertainty",
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn rest_frame() {
        let spectrum = Spectrum::new(
            vec![10_000.0, 20_000.0],
            SpectralUnit::Nanometer,
            vec![1.0, 2.0],
            None,
        )
        .unwrap();
        let rest = spectrum.rest_frame_micron(1.0).unwrap();
        assert_relative_eq!(rest[0], 5.0);
        assert_relative_eq!(rest[1], 10.0);
        assert_eq!(
            spectrum.rest_frame_micron(-1.0),
            Err(SpectrumError::InvalidRedshift(-1.0))
        );
    }

    #[test]
    fn weights() {
        let spectrum =
            Spectrum::from_micron(array![1.0, 2.0], array![3.0, f64::NAN], Some(array![0.5, 0.25]))
                .unwrap();
        assert_eq!(spectrum.inv_err().unwrap(), array![2.0, 4.0]);
        assert_eq!(spectrum.flux_range(), (3.0, 3.0));
        let no_errors = Spectrum::from_micron(array![1.0], array![1.0], None).unwrap();
        assert_eq!(no_errors.inv_err(), Err(SpectrumError::MissingUncertainty));
    }
}
