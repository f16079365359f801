//! Confidence computation for extracted categories
//!
//! Confidence is derived from what happened during extraction, never taken
//! from the oracle: how many items were accepted, how much context backed the
//! prompt and how many parsed items had to be rejected.

/// Share of the score driven by item volume
const VOLUME_WEIGHT: f64 = 0.7;

/// Share of the score driven by context size
const CONTEXT_WEIGHT: f64 = 0.3;

/// Context size at which the context share saturates
const CONTEXT_SATURATION_CHARS: f64 = 1000.0;

/// Fraction of parsed items that became entities; 1.0 when nothing was parsed
pub fn acceptance_ratio(accepted: usize, rejected: usize) -> f64 {
    let parsed = accepted + rejected;
    if parsed == 0 {
        1.0
    } else {
        accepted as f64 / parsed as f64
    }
}

/// Confidence of one category in [0, 1]
pub fn category_confidence(
    accepted: usize,
    rejected: usize,
    context_chars: usize,
    expected_entities: usize,
) -> f64 {
    if accepted == 0 || context_chars == 0 {
        return 0.0;
    }

    let volume = (accepted as f64 / expected_entities.max(1) as f64).min(1.0);
    let context = (context_chars as f64 / CONTEXT_SATURATION_CHARS).min(1.0);
    let score = (volume * VOLUME_WEIGHT + context * CONTEXT_WEIGHT)
        * acceptance_ratio(accepted, rejected);

    score.clamp(0.0, 1.0)
}

/// Mean of category confidences; 0.0 when there are none
pub fn phase_confidence<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_accepted_is_zero() {
        assert_eq!(category_confidence(0, 3, 2000, 5), 0.0);
        assert_eq!(category_confidence(4, 0, 0, 5), 0.0);
    }

    #[test]
    fn test_saturated_category_is_one() {
        let score = category_confidence(8, 0, 5000, 5);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejections_reduce_confidence() {
        let clean = category_confidence(4, 0, 800, 5);
        let noisy = category_confidence(4, 4, 800, 5);
        assert!(noisy < clean);
        assert!((noisy - clean / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_phase_confidence_mean() {
        assert_eq!(phase_confidence(Vec::new()), 0.0);
        assert!((phase_confidence(vec![0.2, 0.4, 0.6]) - 0.4).abs() < 1e-9);
    }
}
