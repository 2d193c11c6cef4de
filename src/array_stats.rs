//! Array helpers shared by initial guessing and attenuation curves

use ndarray::ArrayView1;

/// Linear interpolation of `y(x)` at `at`
///
/// `x` must be monotonic, either increasing or decreasing. Values outside of the `x` range are
/// clamped to the edge values. Returns `None` for empty or mismatched arrays.
pub fn interpolate(x: ArrayView1<f64>, y: ArrayView1<f64>, at: f64) -> Option<f64> {
    let n = x.len();
    if n == 0 || n != y.len() {
        return None;
    }
    if n == 1 {
        return Some(y[0]);
    }

    let ascending = x[0] <= x[n - 1];
    let index = |i: usize| if ascending { i } else { n - 1 - i };
    let key = |i: usize| x[index(i)];
    let value = |i: usize| y[index(i)];

    if at <= key(0) {
        return Some(value(0));
    }
    if at >= key(n - 1) {
        return Some(value(n - 1));
    }

    // key(lo) <= at < key(hi)
    let (mut lo, mut hi) = (0, n - 1);
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if key(mid) <= at {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let t = (at - key(lo)) / (key(hi) - key(lo));
    Some(value(lo) + t * (value(hi) - value(lo)))
}
