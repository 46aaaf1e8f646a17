//! Simple array statistics functions

use crate::data::SortedArray;

/// Root mean square of the values
pub fn rms(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum2: f64 = values.iter().map(|x| x * x).sum();
    Some(f64::sqrt(sum2 / values.len() as f64))
}

/// Median of absolute values
pub fn median_abs(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let abs: SortedArray = values.iter().map(|x| x.abs()).collect::<Vec<_>>().into();
    Some(abs.median())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[3.0, -3.0, 3.0, -3.0]), Some(3.0));
        assert_eq!(rms(&[]), None);
    }

    #[test]
    fn test_median_abs() {
        assert_eq!(median_abs(&[-1.0, 5.0, -3.0]), Some(3.0));
        assert_eq!(median_abs(&[-1.0, 2.0, -3.0, 4.0]), Some(2.5));
    }
}
