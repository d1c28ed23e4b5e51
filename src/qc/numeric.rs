//! Centralizes the Kish effective-N divide-by-zero guard referenced
//! throughout §4.9/§4.10: the weighted-variance and weighted-SEM formulas
//! both divide by `m - 1` (or `w_qc_sum^2 * (m - 1)`), which vanishes when
//! fewer than two weights survive. §7 classifies this as `Error::Numeric`
//! but specifies it is never surfaced as an error — it is "absorbed
//! silently into the mask". Centralizing the guard here keeps that
//! absorption in one place instead of scattered `if m >= 2` checks.

/// Kish-corrected weighted variance numerator, `sum_w_dev2 * m / (m - 1)`.
/// `None` when the Kish denominator `m - 1` vanishes (`m < 2`), signalling
/// the caller to fall back to `0.0` and mark the cell masked.
pub(crate) fn kish_variance(weighted_sq_dev_sum: f64, m: usize) -> Option<f64> {
    if m < 2 {
        return None;
    }
    Some(weighted_sq_dev_sum * m as f64 / (m as f64 - 1.0))
}

/// Weighted-SEM denominator guard, `w_sum^2 * (m - 1)`. `None` when either
/// the weight sum or the Kish denominator vanishes.
pub(crate) fn kish_sem(weighted_sq_dev_sum: f64, w_sum: f64, m: usize) -> Option<f64> {
    if m < 2 || w_sum <= 0.0 {
        return None;
    }
    Some((weighted_sq_dev_sum * m as f64 / (w_sum * w_sum * (m as f64 - 1.0))).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kish_variance_none_below_two_weights() {
        assert_eq!(kish_variance(1.0, 0), None);
        assert_eq!(kish_variance(1.0, 1), None);
        assert!(kish_variance(1.0, 2).is_some());
    }

    #[test]
    fn kish_sem_none_when_weight_sum_vanishes() {
        assert_eq!(kish_sem(1.0, 0.0, 5), None);
        assert_eq!(kish_sem(1.0, 1.0, 1), None);
        assert!(kish_sem(1.0, 1.0, 2).is_some());
    }

    #[test]
    fn kish_sem_matches_direct_formula() {
        let v = kish_sem(2.0, 0.5, 3).unwrap();
        let expected = (2.0 * 3.0 / (0.25 * 2.0)).sqrt();
        assert!((v - expected).abs() < 1e-12);
    }
}
