//! Log-space weight arithmetic
//!
//! Probabilities are combined and normalized in log space to avoid
//! underflow over long traces.

/// Numerically stable log(exp(a) + exp(b)).
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// Numerically stable log(sum(exp(xs))).
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + xs.iter().map(|x| (x - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn test_log_add_exp_matches_direct_sum() {
        let a = (0.3f64).ln();
        let b = (0.2f64).ln();
        assert!((log_add_exp(a, b) - (0.5f64).ln()).abs() < TOLERANCE);
    }

    #[test]
    fn test_log_add_exp_with_neg_infinity() {
        let a = (0.7f64).ln();
        assert_eq!(log_add_exp(a, f64::NEG_INFINITY), a);
        assert_eq!(
            log_add_exp(f64::NEG_INFINITY, f64::NEG_INFINITY),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_log_sum_exp_normalizes_to_zero() {
        let logits = [(0.25f64).ln(), (0.25f64).ln(), (0.5f64).ln()];
        assert!(log_sum_exp(&logits).abs() < TOLERANCE);
    }

    #[test]
    fn test_log_sum_exp_empty_is_neg_infinity() {
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_log_sum_exp_stable_for_large_magnitudes() {
        let logits = [-1000.0, -1000.0];
        let expected = -1000.0 + (2.0f64).ln();
        assert!((log_sum_exp(&logits) - expected).abs() < TOLERANCE);
    }
}
