/// Small statistics helpers over sensor readings, where NaN marks a missing value.
use statrs::statistics::{Data, Median};

/// Median of the finite values in `numbers`, or NaN when there are none.
pub fn nan_median(numbers: &[f64]) -> f64 {
    let finite = numbers
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .collect::<Vec<_>>();
    if finite.is_empty() {
        return f64::NAN;
    }

    Data::new(finite).median()
}

/// Replaces each NaN with the most recent non-NaN value before it. Leading NaNs stay.
pub fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut last = f64::NAN;
    values
        .iter()
        .map(|&value| {
            if !value.is_nan() {
                last = value;
            }
            last
        })
        .collect()
}
