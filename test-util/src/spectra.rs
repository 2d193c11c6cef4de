use ndarray::Array1;
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Plain arrays of a simulated observation: wavelength in micron, flux and its uncertainty
#[derive(Clone, Debug)]
pub struct SyntheticSpectrum {
    pub wavelength: Array1<f64>,
    pub flux: Array1<f64>,
    pub uncertainty: Array1<f64>,
}

/// Sample `model` on `n` points between `wave_min` and `wave_max` micron and add gaussian noise
///
/// The noise standard deviation is `relative_noise * |model| + floor`, the same value is reported
/// as the uncertainty, the generator is seeded for reproducibility.
pub fn noisy_spectrum<F>(
    model: F,
    wave_min: f64,
    wave_max: f64,
    n: usize,
    relative_noise: f64,
    floor: f64,
    seed: u64,
) -> SyntheticSpectrum
where
    F: Fn(f64) -> f64,
{
    let mut rng = StdRng::seed_from_u64(seed);
    let wavelength = Array1::linspace(wave_min, wave_max, n);
    let truth = wavelength.mapv(&model);
    let uncertainty = truth.mapv(|y| relative_noise * y.abs() + floor);
    let flux = truth
        .iter()
        .zip(uncertainty.iter())
        .map(|(&y, &sigma)| {
            let eps: f64 = rng.sample(StandardNormal);
            y + sigma * eps
        })
        .collect();
    SyntheticSpectrum {
        wavelength,
        flux,
        uncertainty,
    }
}
