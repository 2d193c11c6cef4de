use crate::components::component::*;

macro_const! {
    const DOC: &str = r#"
Drude profile of a resolved dust feature

$$
f(x) = P \frac{(\gamma / x_0)^2}{(x / x_0 - x_0 / x)^2 + (\gamma / x_0)^2},
$$
where $P$ is the peak value `power`, $x_0$ is the central `wavelength` and $\gamma$ is `fwhm`, all
wavelengths are in micron.
"#;
}

#[doc = DOC!()]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Drude {
    pub name: String,
    pub wavelength: BoundedParam,
    pub power: BoundedParam,
    pub fwhm: BoundedParam,
}

impl Drude {
    pub fn new(
        name: impl Into<String>,
        wavelength: BoundedParam,
        power: BoundedParam,
        fwhm: BoundedParam,
    ) -> Self {
        Self {
            name: name.into(),
            wavelength,
            power,
            fwhm,
        }
    }

    pub fn doc() -> &'static str {
        DOC
    }
}

/// Drude profile with explicit parameter values
pub(crate) fn drude(x: f64, amplitude: f64, x0: f64, fwhm: f64) -> f64 {
    let relative_width = (fwhm / x0).powi(2);
    amplitude * relative_width / ((x / x0 - x0 / x).powi(2) + relative_width)
}

impl ComponentTrait for Drude {
    fn name(&self) -> &str {
        &self.name
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["wavelength", "power", "fwhm"]
    }

    fn params(&self) -> Vec<BoundedParam> {
        vec![self.wavelength, self.power, self.fwhm]
    }

    fn params_mut(&mut self) -> Vec<&mut BoundedParam> {
        vec![&mut self.wavelength, &mut self.power, &mut self.fwhm]
    }

    fn evaluate(&self, x: f64) -> f64 {
        drude(x, self.power.value, self.wavelength.value, self.fwhm.value)
    }
}
