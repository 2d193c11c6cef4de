pub(super) fn within_bounds(x: &[f64], lower: &[f64], upper: &[f64]) -> bool {
    x.iter()
        .zip(lower)
        .zip(upper)
        .all(|((x, lower), upper)| x >= lower && x <= upper)
}

pub(super) fn clip_to_bounds(x: &mut [f64], lower: &[f64], upper: &[f64]) {
    for ((x, &lower), &upper) in x.iter_mut().zip(lower).zip(upper) {
        *x = x.max(lower).min(upper);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip() {
        let lower = [0.0, f64::NEG_INFINITY];
        let upper = [1.0, 0.0];
        let mut x = [2.0, 3.0];
        assert!(!within_bounds(&x, &lower, &upper));
        clip_to_bounds(&mut x, &lower, &upper);
        assert_eq!(x, [1.0, 0.0]);
        assert!(within_bounds(&x, &lower, &upper));
    }
}
