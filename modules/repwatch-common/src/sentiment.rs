// Sentiment level math. The SQL aggregation in repwatch-store mirrors
// `normalized_level` exactly; keep the two in sync.

use crate::types::SentimentLabel;

/// Weight of the classifier score in the combined per-post value.
pub const SCORE_WEIGHT: f64 = 0.7;

/// Weight of the classifier magnitude in the combined per-post value.
pub const MAGNITUDE_WEIGHT: f64 = 0.3;

/// Map a (score ∈ [-1,1], magnitude ∈ [0,1]) pair onto a single [0,100] scale.
///
/// The weighted sum lands in [-0.7, 1.0]; shifting by +1 and halving maps the
/// full [-1,1] combined range onto [0,1] before scaling to percent.
pub fn normalized_level(score: f64, magnitude: f64) -> f64 {
    ((SCORE_WEIGHT * score + MAGNITUDE_WEIGHT * magnitude) + 1.0) / 2.0 * 100.0
}

/// Label derived from the raw score sign. Zero is neutral.
pub fn label_for_score(score: f64) -> SentimentLabel {
    if score > 0.0 {
        SentimentLabel::Positive
    } else if score == 0.0 {
        SentimentLabel::Neutral
    } else {
        SentimentLabel::Negative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_level_stays_in_bounds() {
        let mut score = -1.0;
        while score <= 1.0 {
            let mut magnitude = 0.0;
            while magnitude <= 1.0 {
                let level = normalized_level(score, magnitude);
                assert!(
                    (0.0..=100.0).contains(&level),
                    "out of bounds: score={score} magnitude={magnitude} level={level}"
                );
                magnitude += 0.05;
            }
            score += 0.05;
        }
    }

    #[test]
    fn normalized_level_known_points() {
        assert!((normalized_level(0.0, 0.0) - 50.0).abs() < 1e-9);
        assert!((normalized_level(1.0, 1.0) - 100.0).abs() < 1e-9);
        assert!((normalized_level(-1.0, 0.0) - 15.0).abs() < 1e-9);
        // 0.7*0.3 + 0.3*0.1 = 0.24 → 62.0
        assert!((normalized_level(0.3, 0.1) - 62.0).abs() < 1e-9);
    }

    #[test]
    fn label_follows_score_sign() {
        assert_eq!(label_for_score(0.4), SentimentLabel::Positive);
        assert_eq!(label_for_score(0.0), SentimentLabel::Neutral);
        assert_eq!(label_for_score(-0.2), SentimentLabel::Negative);
    }
}
