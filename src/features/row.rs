use crate::features::param::BoundedParam;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical nature of a feature, it defines which parameters a row carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Stellar continuum, a blackbody with `temperature` and amplitude `tau`
    Starlight,
    /// Thermal dust continuum, a modified blackbody with `temperature` and amplitude `tau`
    DustContinuum,
    /// Unresolved emission line, a gaussian with `wavelength`, `power` and instrumental `fwhm`
    Line,
    /// Resolved dust band, a Drude profile with `wavelength`, `power` and `fwhm`
    DustFeature,
    /// Attenuation curve with optical depth `tau`, `model` and `geometry`
    Attenuation,
}

impl FeatureKind {
    pub const ALL: [Self; 5] = [
        Self::Starlight,
        Self::DustContinuum,
        Self::Line,
        Self::DustFeature,
        Self::Attenuation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starlight => "starlight",
            Self::DustContinuum => "dust_continuum",
            Self::Line => "line",
            Self::DustFeature => "dust_feature",
            Self::Attenuation => "attenuation",
        }
    }

    /// Parameters a row of this kind may carry
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Self::Starlight | Self::DustContinuum => &["temperature", "tau"],
            Self::Line | Self::DustFeature => &["wavelength", "power", "fwhm"],
            Self::Attenuation => &["tau"],
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown feature kind {s:?}, expected one of: {}",
                    itertools::join(Self::ALL.iter().map(Self::as_str), ", ")
                )
            })
    }
}

/// One row of the features table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureRow {
    pub name: String,
    pub group: String,
    pub kind: FeatureKind,
    #[serde(default)]
    pub temperature: Option<BoundedParam>,
    #[serde(default)]
    pub tau: Option<BoundedParam>,
    #[serde(default)]
    pub wavelength: Option<BoundedParam>,
    #[serde(default)]
    pub power: Option<BoundedParam>,
    #[serde(default)]
    pub fwhm: Option<BoundedParam>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub geometry: Option<String>,
}

impl FeatureRow {
    /// Row without any parameters
    pub fn new(name: impl Into<String>, group: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            kind,
            temperature: None,
            tau: None,
            wavelength: None,
            power: None,
            fwhm: None,
            model: None,
            geometry: None,
        }
    }

    /// Parameter by its column name, `None` for unknown names or empty cells
    pub fn param(&self, name: &str) -> Option<&BoundedParam> {
        match name {
            "temperature" => self.temperature.as_ref(),
            "tau" => self.tau.as_ref(),
            "wavelength" => self.wavelength.as_ref(),
            "power" => self.power.as_ref(),
            "fwhm" => self.fwhm.as_ref(),
            _ => None,
        }
    }

    /// Mutable parameter slot by its column name, `None` for unknown names
    pub fn param_slot_mut(&mut self, name: &str) -> Option<&mut Option<BoundedParam>> {
        match name {
            "temperature" => Some(&mut self.temperature),
            "tau" => Some(&mut self.tau),
            "wavelength" => Some(&mut self.wavelength),
            "power" => Some(&mut self.power),
            "fwhm" => Some(&mut self.fwhm),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_str_round_trip() {
        for kind in FeatureKind::ALL {
            assert_eq!(kind.as_str().parse::<FeatureKind>().unwrap(), kind);
        }
        assert!("gaussian".parse::<FeatureKind>().is_err());
    }

    #[test]
    fn param_slots() {
        let mut row = FeatureRow::new("PAH_6.2", "PAH_6.2", FeatureKind::DustFeature);
        *row.param_slot_mut("fwhm").unwrap() = Some(BoundedParam::fixed(0.19));
        assert_eq!(row.param("fwhm"), Some(&BoundedParam::fixed(0.19)));
        assert_eq!(row.param("power"), None);
        assert!(row.param_slot_mut("amplitude").is_none());
    }
}
