//! Pure grading and scoring rules.
//!
//! Kept free of any I/O so the rules are trivially testable and reusable by
//! both the answer-submission path and the standalone validation helper.

use crate::dao::directory::Question;
use crate::session::model::GameSettings;

/// Canonical form used for every answer comparison: trimmed and case-folded.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Grade a submission against the stored answer key.
///
/// The key is either the literal correct value or a zero-based index into
/// the question's options; both encodings are accepted transparently. The
/// comparison is case-insensitive and ignores surrounding whitespace.
pub fn is_correct(question: &Question, submitted: &str) -> bool {
    let submitted = normalize(submitted);
    let stored = normalize(&question.correct_answer);

    if submitted == stored {
        return true;
    }

    if let Ok(index) = stored.parse::<usize>()
        && let Some(option) = question.options.get(index)
    {
        return normalize(option) == submitted;
    }

    false
}

/// Points awarded for a graded submission.
///
/// Incorrect answers score 0. Correct answers score the question's points,
/// plus a 25% bonus (rounded down) when the answer landed in the first half
/// of the effective time limit. The session settings may override the
/// question's own limit.
pub fn score(question: &Question, settings: &GameSettings, correct: bool, time_spent: u32) -> u32 {
    if !correct {
        return 0;
    }

    let limit = settings.time_per_question.unwrap_or(question.time_limit);
    let mut points = question.points;
    if u64::from(time_spent) * 2 < u64::from(limit) {
        points += question.points / 4;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn question(correct_answer: &str, options: &[&str]) -> Question {
        Question {
            id: Uuid::new_v4(),
            text: "Capital of France?".into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: correct_answer.into(),
            points: 10,
            time_limit: 30,
        }
    }

    #[test]
    fn grades_literal_text_keys_case_insensitively() {
        let q = question("Paris", &["London", "Paris"]);
        assert!(is_correct(&q, "paris"));
        assert!(is_correct(&q, "  PARIS  "));
        assert!(!is_correct(&q, "London"));
    }

    #[test]
    fn grades_index_keys_through_option_resolution() {
        let q = question("1", &["London", "Paris"]);
        assert!(is_correct(&q, "Paris"));
        assert!(is_correct(&q, "paris "));
        // Submitting the index itself also matches the stored key directly.
        assert!(is_correct(&q, "1"));
        assert!(!is_correct(&q, "London"));
        assert!(!is_correct(&q, "0"));
    }

    #[test]
    fn out_of_range_index_keys_never_match_option_text() {
        let q = question("7", &["London", "Paris"]);
        assert!(!is_correct(&q, "Paris"));
        assert!(is_correct(&q, "7"));
    }

    #[test]
    fn incorrect_answers_score_zero_regardless_of_timing() {
        let q = question("Paris", &[]);
        for time_spent in [0, 5, 14, 15, 30, 120] {
            assert_eq!(score(&q, &GameSettings::default(), false, time_spent), 0);
        }
    }

    #[test]
    fn slow_correct_answers_score_the_base_points() {
        let q = question("Paris", &[]);
        let settings = GameSettings::default();
        // Half of 30s is 15s; at or past the boundary there is no bonus.
        assert_eq!(score(&q, &settings, true, 15), 10);
        assert_eq!(score(&q, &settings, true, 29), 10);
    }

    #[test]
    fn fast_correct_answers_earn_the_quarter_bonus() {
        let q = question("Paris", &[]);
        let settings = GameSettings::default();
        assert_eq!(score(&q, &settings, true, 5), 12);
        assert_eq!(score(&q, &settings, true, 14), 12);
    }

    #[test]
    fn bonus_is_floored_on_odd_point_values() {
        let mut q = question("Paris", &[]);
        q.points = 7;
        // floor(7 * 0.25) == 1
        assert_eq!(score(&q, &GameSettings::default(), true, 2), 8);
    }

    #[test]
    fn settings_override_replaces_the_question_limit() {
        let q = question("Paris", &[]);
        let settings = GameSettings {
            time_per_question: Some(10),
            ..GameSettings::default()
        };
        // 5s is half of the 10s override, not under it: no bonus.
        assert_eq!(score(&q, &settings, true, 5), 10);
        assert_eq!(score(&q, &settings, true, 4), 12);
    }
}
