use crate::components::component::*;

/// `2 h c^2` in units giving MJy/sr for wavelength in micron
const PLANCK_SCALE: f64 = 3.97289e13;
/// `h c / k` in micron kelvin
const HC_OVER_K: f64 = 1.4387752e4;
/// Reference wavelength of the dust emissivity law
const EMISSIVITY_WAVELENGTH: f64 = 9.7;

/// Planck function with unit amplitude
pub(crate) fn planck(x: f64, temperature: f64) -> f64 {
    PLANCK_SCALE / x.powi(3) / (HC_OVER_K / (x * temperature)).exp_m1()
}

/// Blackbody with a `(9.7 / x)^2` emissivity and unit amplitude
pub(crate) fn modified_planck(x: f64, temperature: f64) -> f64 {
    planck(x, temperature) * (EMISSIVITY_WAVELENGTH / x).powi(2)
}

macro_const! {
    const BLACKBODY_DOC: &str = r#"
Blackbody emission

$$
f(x) = \tau \frac{3.97289 \times 10^{13}}{x^3} \frac{1}{\exp(1.4387752 \times 10^4 / (x T)) - 1},
$$
where $x$ is wavelength in micron and $T$ is temperature in kelvin. Used for stellar continua.
"#;
}

#[doc = BLACKBODY_DOC!()]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Blackbody {
    pub name: String,
    pub temperature: BoundedParam,
    pub tau: BoundedParam,
}

impl Blackbody {
    pub fn new(name: impl Into<String>, temperature: BoundedParam, tau: BoundedParam) -> Self {
        Self {
            name: name.into(),
            temperature,
            tau,
        }
    }

    pub fn doc() -> &'static str {
        BLACKBODY_DOC
    }
}

impl ComponentTrait for Blackbody {
    fn name(&self) -> &str {
        &self.name
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["temperature", "tau"]
    }

    fn params(&self) -> Vec<BoundedParam> {
        vec![self.temperature, self.tau]
    }

    fn params_mut(&mut self) -> Vec<&mut BoundedParam> {
        vec![&mut self.temperature, &mut self.tau]
    }

    fn evaluate(&self, x: f64) -> f64 {
        self.tau.value * planck(x, self.temperature.value)
    }
}

macro_const! {
    const MODIFIED_BLACKBODY_DOC: &str = r#"
Modified blackbody emission of thermal dust

[Blackbody] multiplied by the emissivity law $(9.7 / x)^2$, $x$ is wavelength in micron.
"#;
}

#[doc = MODIFIED_BLACKBODY_DOC!()]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModifiedBlackbody {
    pub name: String,
    pub temperature: BoundedParam,
    pub tau: BoundedParam,
}

impl ModifiedBlackbody {
    pub fn new(name: impl Into<String>, temperature: BoundedParam, tau: BoundedParam) -> Self {
        Self {
            name: name.into(),
            temperature,
            tau,
        }
    }

    pub fn doc() -> &'static str {
        MODIFIED_BLACKBODY_DOC
    }
}

impl ComponentTrait for ModifiedBlackbody {
    fn name(&self) -> &str {
        &self.name
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["temperature", "tau"]
    }

    fn params(&self) -> Vec<BoundedParam> {
        vec![self.temperature, self.tau]
    }

    fn params_mut(&mut self) -> Vec<&mut BoundedParam> {
        vec![&mut self.temperature, &mut self.tau]
    }

    fn evaluate(&self, x: f64) -> f64 {
        self.tau.value * modified_planck(x, self.temperature.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn wien_peak() {
        // F_nu peaks at x = 5100 / T micron
        let temperature = 300.0;
        let peak = 5100.0 / temperature;
        let bb = Blackbody::new("bb", BoundedParam::fixed(temperature), BoundedParam::free(1.0));
        let at_peak = bb.evaluate(peak);
        assert!(at_peak > bb.evaluate(0.9 * peak));
        assert!(at_peak > bb.evaluate(1.1 * peak));
    }

    #[test]
    fn modified_is_scaled() {
        let bb = Blackbody::new("bb", BoundedParam::fixed(200.0), BoundedParam::free(2.0));
        let mbb =
            ModifiedBlackbody::new("mbb", BoundedParam::fixed(200.0), BoundedParam::free(2.0));
        assert_relative_eq!(mbb.evaluate(9.7), bb.evaluate(9.7));
        assert_relative_eq!(mbb.evaluate(19.4), 0.25 * bb.evaluate(19.4));
    }

    #[test]
    fn planck_value() {
        let expected = 3.97289e13 / 1000.0 / ((1.4387752e4_f64 / (10.0 * 5000.0)).exp() - 1.0);
        assert_relative_eq!(planck(10.0, 5000.0), expected, max_relative = 1e-12);
    }
}
