//! Small numeric helpers shared by the analyzer and the profile controller.
//!
//! Every ratio here special-cases an empty or zero denominator to a fixed
//! default instead of producing NaN or infinity.

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation, or `None` for an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// `numerator / denominator`, or `default` when the denominator is zero.
pub fn ratio_or(numerator: f64, denominator: f64, default: f64) -> f64 {
    if denominator == 0.0 {
        default
    } else {
        numerator / denominator
    }
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
pub fn unit_clamp(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Neutral consistency reported when there are too few scores to judge.
pub const NEUTRAL_CONSISTENCY: f64 = 0.5;

/// Minimum number of scores for a coefficient-of-variation estimate.
pub const MIN_SCORES_FOR_CONSISTENCY: usize = 3;

/// `1 - stddev/mean`, clamped to `[0, 1]`.
///
/// Returns [`NEUTRAL_CONSISTENCY`] for fewer than three scores, and also when
/// the mean is zero.
pub fn consistency(scores: &[f64]) -> f64 {
    if scores.len() < MIN_SCORES_FOR_CONSISTENCY {
        return NEUTRAL_CONSISTENCY;
    }
    let (Some(m), Some(sd)) = (mean(scores), std_dev(scores)) else {
        return NEUTRAL_CONSISTENCY;
    };
    if m == 0.0 {
        return NEUTRAL_CONSISTENCY;
    }
    unit_clamp(1.0 - sd / m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_dev() {
        assert_eq!(mean(&[]), None);
        assert_eq!(std_dev(&[]), None);
        assert!((mean(&[0.2, 0.4, 0.6]).unwrap() - 0.4).abs() < 1e-12);
        // population stddev of {2,4,4,4,5,5,7,9} is 2
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(ratio_or(3.0, 0.0, 0.5), 0.5);
        assert_eq!(ratio_or(3.0, 4.0, 0.5), 0.75);
    }

    #[test]
    fn consistency_neutral_below_three_scores() {
        assert_eq!(consistency(&[]), 0.5);
        assert_eq!(consistency(&[1.0, 0.0]), 0.5);
    }

    #[test]
    fn consistency_of_identical_scores_is_one() {
        assert!((consistency(&[0.7, 0.7, 0.7]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn consistency_is_clamped_at_zero() {
        // mean 1/3, stddev ~0.471 => 1 - 1.41 < 0
        assert_eq!(consistency(&[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(consistency(&[0.0, 0.0, 0.0]), 0.5);
    }

    #[test]
    fn unit_clamp_handles_nan() {
        assert_eq!(unit_clamp(f64::NAN), 0.0);
        assert_eq!(unit_clamp(1.5), 1.0);
        assert_eq!(unit_clamp(-0.5), 0.0);
    }
}
