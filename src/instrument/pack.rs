use crate::error::InstrumentError;
use crate::features::BoundedParam;
use crate::instrument::name::{InstrumentName, wildcard_match};

use itertools::{Itertools, MinMaxResult};
use lazy_static::lazy_static;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Spectral segment of an instrument
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Covered wavelength range in micron, inclusive
    pub range: [f64; 2],
    /// Coefficients of the resolving power polynomial, `R(λ) = Σ c_i λ^i`
    pub coefficients: Vec<f64>,
}

impl Segment {
    pub fn contains(&self, wavelength: f64) -> bool {
        wavelength >= self.range[0] && wavelength <= self.range[1]
    }

    pub fn resolving_power(&self, wavelength: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * wavelength + c)
    }

    /// Width of an unresolved line
    pub fn fwhm(&self, wavelength: f64) -> f64 {
        wavelength / self.resolving_power(wavelength)
    }

    fn validate(&self, name: &str) -> Result<(), InstrumentError> {
        let invalid = |message: &str| InstrumentError::InvalidSegment {
            name: name.to_owned(),
            message: message.to_owned(),
        };
        let [min, max] = self.range;
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min < max) {
            return Err(invalid("range must be two increasing positive numbers"));
        }
        if self.coefficients.is_empty() {
            return Err(invalid("resolving power has no coefficients"));
        }
        if [min, max]
            .into_iter()
            .map(|x| self.resolving_power(x))
            .any(|r| r.is_nan() || r <= 0.0)
        {
            return Err(invalid("resolving power must be positive over the range"));
        }
        Ok(())
    }
}

type BuiltinSegment = (&'static str, [f64; 2], &'static [f64]);

const BUILTIN_SEGMENTS: &[BuiltinSegment] = &[
    ("spitzer.irs.sl.2", [5.22, 7.56], &[0.0, 16.5333]),
    ("spitzer.irs.sl.1", [7.56, 14.28], &[0.0, 8.2667]),
    ("spitzer.irs.ll.2", [14.28, 20.66], &[0.0, 7.6]),
    ("spitzer.irs.ll.1", [20.66, 38.5], &[0.0, 4.0]),
    ("spitzer.irs.sh", [9.9, 19.6], &[600.0]),
    ("spitzer.irs.lh", [18.7, 37.2], &[600.0]),
    ("jwst.miri.mrs.ch1.short", [4.90, 5.74], &[1045.0, 464.286]),
    ("jwst.miri.mrs.ch1.medium", [5.66, 6.63], &[-77.6, 577.320]),
    ("jwst.miri.mrs.ch1.long", [6.53, 7.65], &[126.5, 455.357]),
    ("jwst.miri.mrs.ch2.short", [7.51, 8.77], &[2274.8, 95.238]),
    ("jwst.miri.mrs.ch2.medium", [8.67, 10.13], &[255.9, 287.671]),
    ("jwst.miri.mrs.ch2.long", [10.02, 11.70], &[235.7, 261.905]),
    ("jwst.miri.mrs.ch3.short", [11.55, 13.47], &[424.5, 182.292]),
    ("jwst.miri.mrs.ch3.medium", [13.34, 15.57], &[-3294.8, 381.166]),
    ("jwst.miri.mrs.ch3.long", [15.41, 17.98], &[-2876.8, 315.175]),
    ("jwst.miri.mrs.ch4.short", [17.70, 20.95], &[-1099.7, 144.615]),
    ("jwst.miri.mrs.ch4.medium", [20.69, 24.48], &[1188.7, 23.747]),
    ("jwst.miri.mrs.ch4.long", [24.19, 27.90], &[3586.1, -80.863]),
];

lazy_static! {
    static ref BUILTIN: InstrumentPack = InstrumentPack {
        segments: BUILTIN_SEGMENTS
            .iter()
            .map(|&(name, range, coefficients)| {
                (
                    name.to_owned(),
                    Segment {
                        range,
                        coefficients: coefficients.to_vec(),
                    },
                )
            })
            .collect(),
    };
}

/// Collection of named instrument segments
///
/// Segment names are dot-separated paths like `jwst.miri.mrs.ch1.short`. The built-in pack covers
/// the Spitzer IRS low- and high-resolution modules and the twelve JWST MIRI MRS sub-bands.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct InstrumentPack {
    segments: BTreeMap<String, Segment>,
}

impl InstrumentPack {
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    pub fn new(segments: BTreeMap<String, Segment>) -> Result<Self, InstrumentError> {
        for (name, segment) in &segments {
            segment.validate(name)?;
        }
        Ok(Self { segments })
    }

    /// Parse a YAML pack
    ///
    /// Nested mappings are joined into dot-separated names, a mapping with a `range` key is a
    /// segment:
    ///
    /// ```yaml
    /// spitzer:
    ///   irs:
    ///     sl:
    ///       1:
    ///         range: [7.56, 14.28]
    ///         coefficients: [0.0, 8.2667]
    /// ```
    pub fn from_yaml_str(s: &str) -> Result<Self, InstrumentError> {
        let doc: Value = serde_yaml::from_str(s)?;
        let mut segments = BTreeMap::new();
        collect_segments(String::new(), doc, &mut segments)?;
        Self::new(segments)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, InstrumentError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| InstrumentError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml_str(&s)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_names(&self) -> impl Iterator<Item = &str> {
        self.segments.keys().map(String::as_str)
    }

    /// Segments matching any of the names, each segment is returned once
    pub fn resolve(
        &self,
        names: &InstrumentName,
    ) -> Result<Vec<(&str, &Segment)>, InstrumentError> {
        let mut resolved = vec![];
        for pattern in names.patterns() {
            let before = resolved.len();
            resolved.extend(
                self.segments
                    .iter()
                    .filter(|(name, _)| wildcard_match(pattern, name))
                    .map(|(name, segment)| (name.as_str(), segment)),
            );
            if resolved.len() == before {
                return Err(InstrumentError::UnknownInstrument(pattern.clone()));
            }
        }
        Ok(resolved.into_iter().unique_by(|&(name, _)| name).collect())
    }

    /// Line width at the observed wavelength
    ///
    /// A single covering segment gives a fixed width. If several segments overlap at this
    /// wavelength, the width is their mean bounded by the smallest and the largest one.
    pub fn fwhm(
        &self,
        names: &InstrumentName,
        wavelength: f64,
    ) -> Result<BoundedParam, InstrumentError> {
        let fwhms: Vec<f64> = self
            .resolve(names)?
            .into_iter()
            .filter(|(_, segment)| segment.contains(wavelength))
            .map(|(_, segment)| segment.fwhm(wavelength))
            .collect();
        match fwhms.iter().copied().minmax() {
            MinMaxResult::NoElements => Err(InstrumentError::OutOfRange {
                instrument: names.to_string(),
                wavelength,
            }),
            MinMaxResult::OneElement(fwhm) => Ok(BoundedParam::fixed(fwhm)),
            MinMaxResult::MinMax(min, max) => {
                let mean = fwhms.iter().sum::<f64>() / fwhms.len() as f64;
                Ok(BoundedParam::bounded(mean, Some(min), Some(max)))
            }
        }
    }

    /// Check if any of the segments covers the observed wavelength
    pub fn within_segment(
        &self,
        names: &InstrumentName,
        wavelength: f64,
    ) -> Result<bool, InstrumentError> {
        Ok(self
            .resolve(names)?
            .iter()
            .any(|(_, segment)| segment.contains(wavelength)))
    }

    /// Smallest and largest covered wavelength
    pub fn wave_range(&self, names: &InstrumentName) -> Result<(f64, f64), InstrumentError> {
        let segments = self.resolve(names)?;
        let min = segments
            .iter()
            .map(|(_, segment)| segment.range[0])
            .fold(f64::INFINITY, f64::min);
        let max = segments
            .iter()
            .map(|(_, segment)| segment.range[1])
            .fold(f64::NEG_INFINITY, f64::max);
        Ok((min, max))
    }
}

fn key_to_string(key: &Value) -> Result<String, InstrumentError> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(InstrumentError::InvalidSegment {
            name: format!("{other:?}"),
            message: "segment names must be strings or numbers".to_owned(),
        }),
    }
}

fn collect_segments(
    prefix: String,
    value: Value,
    segments: &mut BTreeMap<String, Segment>,
) -> Result<(), InstrumentError> {
    let Value::Mapping(map) = value else {
        return Err(InstrumentError::InvalidSegment {
            name: prefix,
            message: "expected a mapping".to_owned(),
        });
    };
    if map.contains_key("range") {
        let segment: Segment = serde_yaml::from_value(Value::Mapping(map))?;
        segments.insert(prefix, segment);
        return Ok(());
    }
    for (key, value) in map {
        let key = key_to_string(&key)?;
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        collect_segments(name, value, segments)?;
    }
    Ok(())
}
