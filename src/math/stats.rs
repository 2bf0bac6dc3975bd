//! Column statistics that skip undefined (`NaN`) cells.

/// Mean of the defined values, `None` when every value is `NaN`.
pub fn nan_mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Population standard deviation (`ddof = 0`) around `mean`.
pub fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Replace `NaN` cells by `fill`, in place. Returns how many were replaced.
pub fn fill_nan(values: &mut [f64], fill: f64) -> usize {
    let mut n = 0;
    for v in values.iter_mut().filter(|v| v.is_nan()) {
        *v = fill;
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_mean_skips_undefined() {
        assert_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), Some(2.0));
        assert_eq!(nan_mean(&[f64::NAN]), None);
        assert_eq!(nan_mean(&[]), None);
    }

    #[test]
    fn population_std_uses_n() {
        let v = [1.0, 3.0];
        assert!((population_std(&v, 2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fill_nan_counts_replacements() {
        let mut v = [f64::NAN, 2.0, f64::NAN];
        assert_eq!(fill_nan(&mut v, 5.0), 2);
        assert_eq!(v, [5.0, 2.0, 5.0]);
    }
}
