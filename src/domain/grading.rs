use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Grades live on a 0-5 scale; 3.0 is the pass mark.
pub const MAX_SCORE: f64 = 5.0;
pub const PASS_MARK: f64 = 3.0;

/// One answered question as submitted by the client: whether it was answered
/// correctly and the point weight of the question (defaults to 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    pub is_correct: bool,
    #[serde(default, alias = "pesoPregunta")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreOutcome {
    pub score: f64,
    pub passed: bool,
}

/// Weighted score over a set of answered questions:
/// `score = sum(weight of correct) / sum(all weights) * 5`, rounded to two
/// decimals. An empty set or a zero total weight yields 0, never NaN.
pub fn calculate_weighted_score(answers: &HashMap<String, AnsweredQuestion>) -> ScoreOutcome {
    let mut total_weight = 0.0;
    let mut earned = 0.0;

    for answer in answers.values() {
        let weight = answer.weight.unwrap_or(1.0);
        if weight <= 0.0 {
            continue;
        }
        total_weight += weight;
        if answer.is_correct {
            earned += weight;
        }
    }

    if total_weight <= 0.0 {
        return ScoreOutcome { score: 0.0, passed: false };
    }

    let score = round2(earned / total_weight * MAX_SCORE);
    ScoreOutcome { score, passed: score >= PASS_MARK }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(entries: &[(&str, bool, Option<f64>)]) -> HashMap<String, AnsweredQuestion> {
        entries
            .iter()
            .map(|(id, correct, weight)| {
                (
                    id.to_string(),
                    AnsweredQuestion { is_correct: *correct, weight: *weight },
                )
            })
            .collect()
    }

    #[test]
    fn all_correct_is_full_marks() {
        let set = answers(&[("q1", true, Some(2.0)), ("q2", true, Some(3.0))]);
        let outcome = calculate_weighted_score(&set);
        assert_eq!(outcome.score, 5.0);
        assert!(outcome.passed);
    }

    #[test]
    fn half_right_equal_weights() {
        let set = answers(&[("q1", true, Some(1.0)), ("q2", false, Some(1.0))]);
        let outcome = calculate_weighted_score(&set);
        assert_eq!(outcome.score, 2.5);
        assert!(!outcome.passed);
    }

    #[test]
    fn default_weight_is_one() {
        let set = answers(&[("q1", true, None), ("q2", false, None), ("q3", false, None)]);
        let outcome = calculate_weighted_score(&set);
        assert!((outcome.score - 1.67).abs() < 1e-9);
    }

    #[test]
    fn empty_set_returns_zero_not_nan() {
        let outcome = calculate_weighted_score(&HashMap::new());
        assert_eq!(outcome.score, 0.0);
        assert!(!outcome.passed);
        assert!(!outcome.score.is_nan());
    }

    #[test]
    fn nonpositive_weights_do_not_poison_the_denominator() {
        let set = answers(&[("q1", true, Some(0.0)), ("q2", true, Some(-3.0))]);
        let outcome = calculate_weighted_score(&set);
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn score_stays_in_range() {
        let set = answers(&[
            ("q1", true, Some(0.5)),
            ("q2", false, Some(7.0)),
            ("q3", true, Some(1.25)),
        ]);
        let outcome = calculate_weighted_score(&set);
        assert!(outcome.score >= 0.0 && outcome.score <= MAX_SCORE);
    }

    #[test]
    fn flipping_an_answer_to_correct_never_lowers_the_score() {
        let base = answers(&[("q1", true, Some(2.0)), ("q2", false, Some(3.0)), ("q3", false, None)]);
        let before = calculate_weighted_score(&base);

        for flip in ["q2", "q3"] {
            let mut improved = base.clone();
            improved.get_mut(flip).unwrap().is_correct = true;
            let after = calculate_weighted_score(&improved);
            assert!(after.score >= before.score);
            assert!(after.passed || !before.passed);
        }
    }

    #[test]
    fn pass_mark_is_inclusive() {
        // 3 of 5 points => exactly 3.0
        let set = answers(&[
            ("q1", true, Some(3.0)),
            ("q2", false, Some(2.0)),
        ]);
        let outcome = calculate_weighted_score(&set);
        assert_eq!(outcome.score, 3.0);
        assert!(outcome.passed);
    }
}
