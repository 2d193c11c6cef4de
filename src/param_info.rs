//! Feature parameters grouped by physical component, the bridge between a [Features] table and a
//! [CompositeModel](crate::CompositeModel)

use crate::array_stats::interpolate;
use crate::components::{Geometry, modified_planck, planck};
use crate::error::{InstrumentError, ParamInfoError};
use crate::features::definition::{DEFAULT_ATTENUATION_MODEL, DEFAULT_GEOMETRY};
use crate::features::{BoundedParam, FeatureKind, FeatureRow, Features};
use crate::instrument::{InstrumentName, InstrumentPack};

use ndarray::Array1;

/// Blackbodies with at least this temperature are treated as stellar continua
pub const STELLAR_TEMPERATURE: f64 = 2500.0;
/// Wien displacement constant in micron kelvin
const WIEN_CONSTANT: f64 = 2898.0;
/// Fraction of the flux at the Wien peak given to every dust continuum
const DUST_CONTINUUM_FRACTION: f64 = 0.2;
/// Fraction of the flux at the centre given to every line and dust feature
const PROFILE_FRACTION: f64 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct ContinuumInfo {
    pub name: String,
    pub temperature: BoundedParam,
    pub tau: BoundedParam,
}

/// Line or dust feature, line widths are `None` until the instrument is applied
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileInfo {
    pub name: String,
    pub wavelength: BoundedParam,
    pub power: BoundedParam,
    pub fwhm: Option<BoundedParam>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttenuationInfo {
    pub name: String,
    pub tau: BoundedParam,
    pub geometry: Geometry,
}

/// Transient view of the feature table, never stored
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamInfo {
    pub blackbodies: Vec<ContinuumInfo>,
    pub modified_blackbodies: Vec<ContinuumInfo>,
    pub lines: Vec<ProfileInfo>,
    pub dust_features: Vec<ProfileInfo>,
    pub attenuation: Option<AttenuationInfo>,
}

fn required(row: &FeatureRow, parameter: &'static str) -> Result<BoundedParam, ParamInfoError> {
    row.param(parameter)
        .copied()
        .ok_or_else(|| ParamInfoError::MissingParameter {
            feature: row.name.clone(),
            parameter,
        })
}

fn continuum(row: &FeatureRow) -> Result<ContinuumInfo, ParamInfoError> {
    Ok(ContinuumInfo {
        name: row.name.clone(),
        temperature: required(row, "temperature")?,
        tau: required(row, "tau")?,
    })
}

fn profile(row: &FeatureRow, fwhm_required: bool) -> Result<ProfileInfo, ParamInfoError> {
    Ok(ProfileInfo {
        name: row.name.clone(),
        wavelength: required(row, "wavelength")?,
        power: required(row, "power")?,
        fwhm: if fwhm_required {
            Some(required(row, "fwhm")?)
        } else {
            row.fwhm
        },
    })
}

fn attenuation(row: &FeatureRow) -> Result<AttenuationInfo, ParamInfoError> {
    let model = row.model.as_deref().unwrap_or(DEFAULT_ATTENUATION_MODEL);
    if !model.eq_ignore_ascii_case(DEFAULT_ATTENUATION_MODEL) {
        return Err(ParamInfoError::UnsupportedAttenuation {
            feature: row.name.clone(),
            model: model.to_owned(),
        });
    }
    let geometry = row.geometry.as_deref().unwrap_or(DEFAULT_GEOMETRY);
    let geometry = geometry
        .parse()
        .map_err(|_| ParamInfoError::UnsupportedGeometry {
            feature: row.name.clone(),
            geometry: geometry.to_owned(),
        })?;
    Ok(AttenuationInfo {
        name: row.name.clone(),
        tau: required(row, "tau")?,
        geometry,
    })
}

fn scale(param: BoundedParam, factor: f64) -> BoundedParam {
    BoundedParam {
        value: param.value * factor,
        min: param.min.map(|x| x * factor),
        max: param.max.map(|x| x * factor),
        fixed: param.fixed,
    }
}

fn retain_covered(
    profiles: Vec<ProfileInfo>,
    pack: &InstrumentPack,
    instrument: &InstrumentName,
    redshift_factor: f64,
) -> Result<Vec<ProfileInfo>, InstrumentError> {
    let mut kept = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let observed = profile.wavelength.value * redshift_factor;
        if pack.within_segment(instrument, observed)? {
            kept.push(profile);
        } else {
            log::debug!(
                "dropping {}: {observed} micron is not covered by {instrument}",
                profile.name
            );
        }
    }
    Ok(kept)
}

impl ParamInfo {
    pub fn from_features(features: &Features) -> Result<Self, ParamInfoError> {
        let mut info = Self::default();
        for row in features {
            match row.kind {
                FeatureKind::Starlight => info.blackbodies.push(continuum(row)?),
                FeatureKind::DustContinuum => info.modified_blackbodies.push(continuum(row)?),
                FeatureKind::Line => info.lines.push(profile(row, false)?),
                FeatureKind::DustFeature => info.dust_features.push(profile(row, true)?),
                FeatureKind::Attenuation => {
                    if let Some(existing) = &info.attenuation {
                        return Err(ParamInfoError::MultipleAttenuation(
                            existing.name.clone(),
                            row.name.clone(),
                        ));
                    }
                    info.attenuation = Some(attenuation(row)?);
                }
            }
        }
        Ok(info)
    }

    /// Total number of components
    pub fn len(&self) -> usize {
        self.blackbodies.len()
            + self.modified_blackbodies.len()
            + self.lines.len()
            + self.dust_features.len()
            + usize::from(self.attenuation.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adjust line widths and drop features the instrument doesn't observe
    ///
    /// Wavelengths in the table are in the rest frame, the instrument is evaluated at the observed
    /// wavelength `λ (1 + z)` and the resulting width is converted back to the rest frame. Line
    /// widths fixed in the table are kept.
    pub fn apply_instrument(
        &mut self,
        pack: &InstrumentPack,
        instrument: &InstrumentName,
        redshift: f64,
    ) -> Result<(), InstrumentError> {
        let factor = 1.0 + redshift;
        let n_lines = self.lines.len();
        let n_dust_features = self.dust_features.len();
        self.lines = retain_covered(std::mem::take(&mut self.lines), pack, instrument, factor)?;
        self.dust_features = retain_covered(
            std::mem::take(&mut self.dust_features),
            pack,
            instrument,
            factor,
        )?;
        for line in &mut self.lines {
            if line.fwhm.is_some_and(|fwhm| fwhm.fixed) {
                continue;
            }
            let observed = pack.fwhm(instrument, line.wavelength.value * factor)?;
            line.fwhm = Some(scale(observed, factor.recip()));
        }
        log::info!(
            "{instrument} covers {} of {n_lines} lines and {} of {n_dust_features} dust features",
            self.lines.len(),
            self.dust_features.len(),
        );
        Ok(())
    }

    /// Initial amplitudes estimated from the observed flux
    ///
    /// `x` is the rest-frame wavelength in micron, it must be monotonic. Stellar blackbodies are
    /// scaled to the flux near the short-wavelength end, other continua to a fraction of the flux
    /// at their Wien peak, lines and dust features to half the flux at their centre. Fixed
    /// amplitudes are kept and all estimates are clipped into the bounds.
    pub fn estimate_init(&mut self, x: &Array1<f64>, y: &Array1<f64>) {
        if x.is_empty() {
            return;
        }
        let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
        let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let flux_at = |at: f64| {
            interpolate(x.view(), y.view(), at)
                .filter(|flux| flux.is_finite())
                .unwrap_or(0.0)
        };
        let set = |param: &mut BoundedParam, estimate: f64| {
            if !param.fixed && estimate.is_finite() {
                param.value = param.clip(estimate.max(0.0));
            }
        };

        for bb in &mut self.blackbodies {
            let temperature = bb.temperature.value;
            let (wavelength, fraction) = if temperature >= STELLAR_TEMPERATURE {
                let wavelength = if x_min < 5.0 { x_min + 0.1 } else { 5.5 };
                (wavelength, 1.0)
            } else {
                (
                    (WIEN_CONSTANT / temperature).clamp(x_min, x_max),
                    DUST_CONTINUUM_FRACTION,
                )
            };
            set(
                &mut bb.tau,
                fraction * flux_at(wavelength) / planck(wavelength, temperature),
            );
        }
        for bb in &mut self.modified_blackbodies {
            let temperature = bb.temperature.value;
            let wavelength = (WIEN_CONSTANT / temperature).clamp(x_min, x_max);
            set(
                &mut bb.tau,
                DUST_CONTINUUM_FRACTION * flux_at(wavelength)
                    / modified_planck(wavelength, temperature),
            );
        }
        for profile in self.lines.iter_mut().chain(self.dust_features.iter_mut()) {
            set(
                &mut profile.power,
                PROFILE_FRACTION * flux_at(profile.wavelength.value),
            );
        }
    }
}
