use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A parameter value together with its allowed range
///
/// `None` bounds mean the parameter is unbounded on that side. A `fixed` parameter keeps its value
/// during guessing and fitting regardless of the bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundedParam {
    pub value: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub fixed: bool,
}

impl BoundedParam {
    /// Parameter which is not varied
    pub fn fixed(value: f64) -> Self {
        Self {
            value,
            min: None,
            max: None,
            fixed: true,
        }
    }

    /// Free parameter without bounds
    pub fn free(value: f64) -> Self {
        Self {
            value,
            min: None,
            max: None,
            fixed: false,
        }
    }

    /// Free parameter limited to `[min, max]`, `None` meaning unbounded
    pub fn bounded(value: f64, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            value,
            min,
            max,
            fixed: false,
        }
    }

    /// Lower bound, negative infinity if unbounded
    #[inline]
    pub fn lower(&self) -> f64 {
        self.min.unwrap_or(f64::NEG_INFINITY)
    }

    /// Upper bound, positive infinity if unbounded
    #[inline]
    pub fn upper(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower() && x <= self.upper()
    }

    /// Clip `x` into the bounds
    pub fn clip(&self, x: f64) -> f64 {
        x.max(self.lower()).min(self.upper())
    }

    /// Same bounds and flag, new value
    pub fn with_value(self, value: f64) -> Self {
        Self { value, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_sides_are_infinite() {
        let p = BoundedParam::bounded(1.0, Some(0.0), None);
        assert_eq!(p.lower(), 0.0);
        assert_eq!(p.upper(), f64::INFINITY);
        assert!(p.contains(1e300));
        assert!(!p.contains(-1e-300));
    }

    #[test]
    fn clip_keeps_value_inside() {
        let p = BoundedParam::bounded(1.0, Some(0.5), Some(2.0));
        assert_eq!(p.clip(-3.0), 0.5);
        assert_eq!(p.clip(3.0), 2.0);
        assert_eq!(p.clip(1.5), 1.5);
    }

    #[test]
    fn with_value_keeps_bounds() {
        let p = BoundedParam::bounded(1.0, Some(0.5), Some(2.0)).with_value(1.7);
        assert_eq!(p, BoundedParam::bounded(1.7, Some(0.5), Some(2.0)));
    }
}
