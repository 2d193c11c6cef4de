use crate::error::FitError;

use ndarray::Array1;

/// Observations to fit: abscissa, ordinate and inverse uncertainty
#[derive(Clone, Debug)]
pub struct Data {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub inv_err: Array1<f64>,
}

impl Data {
    /// Check lengths and that every inverse uncertainty is positive and finite
    pub fn new(x: Array1<f64>, y: Array1<f64>, inv_err: Array1<f64>) -> Result<Self, FitError> {
        if x.len() != y.len() || x.len() != inv_err.len() {
            return Err(FitError::LengthMismatch {
                x: x.len(),
                y: y.len(),
                inv_err: inv_err.len(),
            });
        }
        if let Some(index) = inv_err.iter().position(|&w| !(w.is_finite() && w > 0.0)) {
            return Err(FitError::InvalidUncertainty { index });
        }
        Ok(Self { x, y, inv_err })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Weighted residuals `(model - y) * inv_err`
    pub fn residuals(&self, model: &Array1<f64>) -> Array1<f64> {
        (model - &self.y) * &self.inv_err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    #[test]
    fn validation() {
        assert_eq!(
            Data::new(array![1.0, 2.0], array![1.0], array![1.0, 1.0]).unwrap_err(),
            FitError::LengthMismatch {
                x: 2,
                y: 1,
                inv_err: 2
            }
        );
        assert_eq!(
            Data::new(array![1.0, 2.0], array![1.0, 1.0], array![1.0, f64::INFINITY]).unwrap_err(),
            FitError::InvalidUncertainty { index: 1 }
        );
        assert_eq!(
            Data::new(array![1.0], array![1.0], array![0.0]).unwrap_err(),
            FitError::InvalidUncertainty { index: 0 }
        );
    }

    #[test]
    fn residuals() {
        let data = Data::new(array![1.0, 2.0], array![1.0, 3.0], array![2.0, 0.5]).unwrap();
        assert_eq!(data.residuals(&array![2.0, 1.0]), array![2.0, -1.0]);
    }
}
