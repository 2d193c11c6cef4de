use crate::components::component::*;

use std::f64::consts::LN_2;

macro_const! {
    const DOC: &str = r#"
Gaussian profile of an unresolved line

$$
f(x) = P \exp\left(-\frac{(x - x_0)^2}{2 \sigma^2}\right), \quad \sigma = \frac{\gamma}{2\sqrt{2 \ln 2}},
$$
where $P$ is the peak value `power`, $x_0$ is the central `wavelength` and $\gamma$ is `fwhm`.
"#;
}

#[doc = DOC!()]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Gaussian {
    pub name: String,
    pub wavelength: BoundedParam,
    pub power: BoundedParam,
    pub fwhm: BoundedParam,
}

impl Gaussian {
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

    fn sigma(&self) -> f64 {
        self.fwhm.value / (2.0 * (2.0 * LN_2).sqrt())
    }
}

impl ComponentTrait for Gaussian {
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
        let z = (x - self.wavelength.value) / self.sigma();
        self.power.value * (-0.5 * z * z).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn half_maximum() {
        let g = Gaussian::new(
            "[NeII]",
            BoundedParam::free(12.813),
            BoundedParam::free(2.0),
            BoundedParam::fixed(0.1),
        );
        assert_relative_eq!(g.evaluate(12.813), 2.0);
        assert_relative_eq!(g.evaluate(12.813 + 0.05), 1.0, max_relative = 1e-12);
        assert_relative_eq!(g.evaluate(12.813 - 0.05), 1.0, max_relative = 1e-12);
        assert_eq!(g.param_names(), ["wavelength", "power", "fwhm"]);
    }
}
