use crate::array_stats::interpolate;
use crate::components::component::*;
use crate::components::drude::drude;

use ndarray::ArrayView1;
use std::fmt;
use std::str::FromStr;

/// Kemper, Vriend & Tielens (2004) silicate profile, wavelengths in micron
const KVT_WAVELENGTH: [f64; 27] = [
    8.0, 8.2, 8.4, 8.6, 8.8, 9.0, 9.2, 9.4, 9.6, 9.7, 9.75, 9.8, 10.0, 10.2, 10.4, 10.6, 10.8,
    11.0, 11.2, 11.4, 11.6, 11.8, 12.0, 12.2, 12.4, 12.6, 12.7,
];
const KVT_PROFILE: [f64; 27] = [
    0.06, 0.09, 0.16, 0.275, 0.415, 0.575, 0.755, 0.895, 0.98, 0.99, 1.0, 0.99, 0.94, 0.83,
    0.745, 0.655, 0.58, 0.525, 0.43, 0.35, 0.27, 0.20, 0.13, 0.07, 0.06, 0.045, 0.04314,
];
/// The tabulated profile drops linearly to zero between the last table point and this wavelength
const KVT_CUTOFF: f64 = 13.0;
const SHORT_SLOPE: f64 = 2.03;
const DRUDE_18_AMPLITUDE: f64 = 0.4;
const DRUDE_18_WAVELENGTH: f64 = 18.0;
const DRUDE_18_FWHM: f64 = 0.247 * 18.0;
/// Weight of the power-law continuum in the extinction curve
const BETA: f64 = 0.1;
const POWER_LAW_INDEX: f64 = 1.7;
const REFERENCE_WAVELENGTH: f64 = 9.7;

/// Silicate extinction profile normalised to unity at 9.7 micron, without optical depth
pub(crate) fn s07_profile(x: f64) -> f64 {
    let first = KVT_WAVELENGTH[0];
    let last = KVT_WAVELENGTH[KVT_WAVELENGTH.len() - 1];
    let kvt = if x < first {
        KVT_PROFILE[0] * (SHORT_SLOPE * (x - first)).exp()
    } else if x <= last {
        interpolate(
            ArrayView1::from(&KVT_WAVELENGTH),
            ArrayView1::from(&KVT_PROFILE),
            x,
        )
        .unwrap_or(0.0)
    } else if x < KVT_CUTOFF {
        KVT_PROFILE[KVT_PROFILE.len() - 1] * (KVT_CUTOFF - x) / (KVT_CUTOFF - last)
    } else {
        0.0
    };
    let extinction = kvt + drude(x, DRUDE_18_AMPLITUDE, DRUDE_18_WAVELENGTH, DRUDE_18_FWHM);
    (1.0 - BETA) * extinction + BETA * (REFERENCE_WAVELENGTH / x).powf(POWER_LAW_INDEX)
}

/// Relative position of dust and emitting sources
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Geometry {
    /// Dust is mixed with the sources, transmission is `(1 - exp(-τ)) / τ`
    #[default]
    Mixed,
    /// Foreground dust screen, transmission is `exp(-τ)`
    Screen,
}

impl Geometry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mixed => "mixed",
            Self::Screen => "screen",
        }
    }

    /// Fraction of the emission transmitted through optical depth `tau`
    pub fn transmission(&self, tau: f64) -> f64 {
        match self {
            Self::Mixed if tau == 0.0 => 1.0,
            Self::Mixed => -(-tau).exp_m1() / tau,
            Self::Screen => (-tau).exp(),
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Geometry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mixed" => Ok(Self::Mixed),
            "screen" => Ok(Self::Screen),
            _ => Err(format!("unknown geometry {s:?}, expected mixed or screen")),
        }
    }
}

macro_const! {
    const DOC: &str = r#"
Silicate attenuation following Smith et al. (2007)

The extinction profile is the Kemper, Vriend & Tielens (2004) silicate curve with an additional
Drude component at 18 micron, mixed with a $(9.7 / x)^{1.7}$ power law:
$$
\tau(x) = \tau_{9.7} \left[(1 - \beta) \, k(x) + \beta \left(\frac{9.7}{x}\right)^{1.7}\right],
\quad \beta = 0.1.
$$
The component multiplies the emission by $(1 - e^{-\tau}) / \tau$ for the `mixed` geometry and by
$e^{-\tau}$ for the `screen` geometry.
"#;
}

#[doc = DOC!()]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct S07Attenuation {
    pub name: String,
    pub tau: BoundedParam,
    pub geometry: Geometry,
}

impl S07Attenuation {
    pub fn new(name: impl Into<String>, tau: BoundedParam, geometry: Geometry) -> Self {
        Self {
            name: name.into(),
            tau,
            geometry,
        }
    }

    pub fn doc() -> &'static str {
        DOC
    }
}

impl ComponentTrait for S07Attenuation {
    fn name(&self) -> &str {
        &self.name
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["tau"]
    }

    fn params(&self) -> Vec<BoundedParam> {
        vec![self.tau]
    }

    fn params_mut(&mut self) -> Vec<&mut BoundedParam> {
        vec![&mut self.tau]
    }

    fn evaluate(&self, x: f64) -> f64 {
        self.geometry
            .transmission(self.tau.value * s07_profile(x))
    }

    fn is_multiplicative(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn profile_peaks_near_ten_micron() {
        let peak = s07_profile(9.75);
        for x in [5.0, 8.0, 12.0, 15.0, 25.0] {
            assert!(s07_profile(x) < peak, "x = {x}");
        }
        assert!(s07_profile(18.0) > s07_profile(14.0));
    }

    #[test]
    fn profile_is_continuous() {
        for edge in [8.0, 12.7, KVT_CUTOFF] {
            assert_relative_eq!(
                s07_profile(edge - 1e-9),
                s07_profile(edge + 1e-9),
                max_relative = 1e-6
            );
        }
    }

    #[test]
    fn transmission() {
        assert_eq!(Geometry::Mixed.transmission(0.0), 1.0);
        assert_relative_eq!(Geometry::Mixed.transmission(1.0), 1.0 - (-1.0_f64).exp());
        assert_relative_eq!(Geometry::Screen.transmission(2.0), (-2.0_f64).exp());
        assert_relative_eq!(
            Geometry::Mixed.transmission(1e-12),
            1.0,
            max_relative = 1e-11
        );
    }

    #[test]
    fn zero_depth_is_transparent() {
        let att = S07Attenuation::new("silicate", BoundedParam::free(0.0), Geometry::Screen);
        assert_eq!(att.evaluate(9.7), 1.0);
        assert!(att.is_multiplicative());
        let att = S07Attenuation::new("silicate", BoundedParam::free(2.0), Geometry::Screen);
        assert!(att.evaluate(9.7) < att.evaluate(6.0));
    }

    #[test]
    fn geometry_from_str() {
        assert_eq!("Screen".parse::<Geometry>().unwrap(), Geometry::Screen);
        assert!("slab".parse::<Geometry>().is_err());
    }
}
