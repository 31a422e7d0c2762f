//! Statistical functions over the whole stack
//!
//! Values are passed bottom-first, exactly as they sit on the stack, and are
//! folded from the top down.

/// Sum of all values; `0` for an empty stack
pub fn sum(values: &[f64]) -> f64 {
    values.iter().rev().fold(0.0, |acc, v| acc + v)
}

/// Mean of all values along with the element count.
///
/// An empty stack yields NaN and a count of 0.
pub fn average(values: &[f64]) -> (f64, usize) {
    let count = values.len();
    (sum(values) / count as f64, count)
}

/// Smallest value; NaN if any value is NaN, `None` for an empty stack
pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().rev().copied().reduce(|acc, v| {
        if acc.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            acc.min(v)
        }
    })
}

/// Largest value; NaN if any value is NaN, `None` for an empty stack
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().rev().copied().reduce(|acc, v| {
        if acc.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            acc.max(v)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum() {
        assert_eq!(sum(&[1.0, 2.0, 3.0]), 6.0);
        assert_eq!(sum(&[]), 0.0);
    }

    #[test]
    fn test_average() {
        assert_eq!(average(&[2.0, 4.0, 6.0]), (4.0, 3));
        let (mean, count) = average(&[]);
        assert!(mean.is_nan());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min(&[3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(max(&[3.0, 1.0, 2.0]), Some(3.0));
        assert_eq!(min(&[]), None);
        assert!(max(&[1.0, f64::NAN, 2.0]).is_some_and(f64::is_nan));
    }
}
