/// Tolerance within which a cosine or ratio slightly outside [-1, 1] is treated as
/// floating-point overshoot rather than a real domain violation.
pub(crate) const UNIT_DOMAIN_TOLERANCE: f64 = 1e-9;

pub fn min_of_2<T: PartialOrd + Copy>(first: T, second: T) -> T {
    if first < second {
        first
    } else {
        second
    }
}

pub fn max_of_2<T: PartialOrd + Copy>(first: T, second: T) -> T {
    if first > second {
        first
    } else {
        second
    }
}

/// Limits `value` to `[lower, upper]`, letting NaN through untouched.
pub(crate) fn clip(value: f64, lower: f64, upper: f64) -> f64 {
    if value.is_nan() {
        return value;
    }
    min_of_2(max_of_2(value, lower), upper)
}

/// Pulls a value that overshoots [-1, 1] by less than the tolerance back onto the
/// boundary. Returns `None` when the overshoot is larger than that.
pub(crate) fn clip_to_unit_domain(value: f64) -> Option<f64> {
    if value.is_nan() {
        return Some(value);
    }
    if value.abs() > 1. + UNIT_DOMAIN_TOLERANCE {
        return None;
    }
    Some(clip(value, -1., 1.))
}
