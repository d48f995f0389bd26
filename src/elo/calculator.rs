use serde::{Deserialize, Serialize};

use crate::validation::ValidationOutcome;

/// Tuning for the scouter rating update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloSettings {
    /// Maximum rating movement for a single validation
    pub k_factor: f64,
    /// Rating given to a scouter with no history; also the baseline opponent
    pub initial_rating: i32,
    pub rating_floor: i32,
}

impl Default for EloSettings {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            initial_rating: 1500,
            rating_floor: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EloCalculation {
    pub new_rating: i32,
    pub delta: i32,
}

/// Treats each validation as a game against a baseline-rated opponent where
/// the accuracy score is the actual result (1 = win, 0 = loss).
#[derive(Debug, Clone, Default)]
pub struct EloCalculator {
    settings: EloSettings,
}

impl EloCalculator {
    pub fn new(settings: EloSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EloSettings {
        &self.settings
    }

    pub fn initial_rating(&self) -> i32 {
        self.settings.initial_rating
    }

    /// Probability that a scouter at `rating` agrees with the truth
    pub fn expected_score(&self, rating: i32) -> f64 {
        let diff = (self.settings.initial_rating - rating) as f64;
        1.0 / (1.0 + 10f64.powf(diff / 400.0))
    }

    pub fn calculate_new_rating(&self, current_rating: i32, accuracy_score: f64) -> EloCalculation {
        let accuracy = if accuracy_score.is_nan() {
            0.0
        } else {
            accuracy_score.clamp(0.0, 1.0)
        };

        let expected = self.expected_score(current_rating);
        let raw = current_rating as f64 + self.settings.k_factor * (accuracy - expected);
        let new_rating = (raw.round() as i32).max(self.settings.rating_floor);

        EloCalculation {
            new_rating,
            delta: new_rating - current_rating,
        }
    }

    /// Win / draw-ish / loss mapping of a categorical outcome
    pub fn outcome_to_accuracy_score(outcome: ValidationOutcome) -> f64 {
        match outcome {
            ValidationOutcome::ExactMatch => 1.0,
            ValidationOutcome::CloseMatch => 0.7,
            ValidationOutcome::Mismatch => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1500, 1.0, 1516, 16)]
    #[case(1500, 0.7, 1506, 6)]
    #[case(1500, 0.5, 1500, 0)]
    #[case(1500, 0.0, 1484, -16)]
    #[case(1700, 1.0, 1708, 8)]
    #[case(1700, 0.0, 1676, -24)]
    fn applies_standard_update(
        #[case] current: i32,
        #[case] accuracy: f64,
        #[case] expected_rating: i32,
        #[case] expected_delta: i32,
    ) {
        let calculator = EloCalculator::default();
        let result = calculator.calculate_new_rating(current, accuracy);

        assert_eq!(result.new_rating, expected_rating);
        assert_eq!(result.delta, expected_delta);
    }

    #[rstest]
    #[case(ValidationOutcome::ExactMatch, 1.0)]
    #[case(ValidationOutcome::CloseMatch, 0.7)]
    #[case(ValidationOutcome::Mismatch, 0.0)]
    fn maps_outcomes_to_scores(#[case] outcome: ValidationOutcome, #[case] score: f64) {
        assert_eq!(EloCalculator::outcome_to_accuracy_score(outcome), score);
    }

    #[test]
    fn higher_accuracy_never_lowers_the_result() {
        let calculator = EloCalculator::default();

        for current in [100, 800, 1500, 2100, 2900] {
            let mut previous = i32::MIN;
            for step in 0..=100 {
                let accuracy = step as f64 / 100.0;
                let rating = calculator.calculate_new_rating(current, accuracy).new_rating;
                assert!(
                    rating >= previous,
                    "rating dropped at current={current} accuracy={accuracy}"
                );
                previous = rating;
            }
        }
    }

    #[test]
    fn clamps_out_of_range_accuracy() {
        let calculator = EloCalculator::default();

        assert_eq!(
            calculator.calculate_new_rating(1500, 1.8),
            calculator.calculate_new_rating(1500, 1.0)
        );
        assert_eq!(
            calculator.calculate_new_rating(1500, -0.3),
            calculator.calculate_new_rating(1500, 0.0)
        );
        assert_eq!(
            calculator.calculate_new_rating(1500, f64::NAN),
            calculator.calculate_new_rating(1500, 0.0)
        );
    }

    #[test]
    fn respects_rating_floor() {
        let calculator = EloCalculator::new(EloSettings {
            rating_floor: 1490,
            ..EloSettings::default()
        });

        let result = calculator.calculate_new_rating(1495, 0.0);
        assert_eq!(result.new_rating, 1490);
        assert_eq!(result.delta, -5);
    }

    #[test]
    fn expected_score_is_even_at_baseline() {
        let calculator = EloCalculator::default();
        assert!((calculator.expected_score(1500) - 0.5).abs() < 1e-12);
        assert!(calculator.expected_score(1600) > 0.5);
    }
}
