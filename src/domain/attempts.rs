use serde::Serialize;

/// Reviewed ("revisada") activities allow at most this many recorded attempts
/// per student. Non-reviewed activities are unbounded.
pub const MAX_REVIEWED_ATTEMPTS: i32 = 3;

/// Outcome of trying to record one more attempt. `Exhausted` carries the last
/// grade on file so the client can render a locked state.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "state")]
pub enum AttemptOutcome {
    Recorded { attempt_count: i32, final_grade: f64 },
    Exhausted { attempt_count: i32, final_grade: f64 },
}

/// Whether a further attempt may be recorded given the attempts already on
/// file. This mirrors the SQL guard in `db::record_attempt`, which is the
/// authoritative (atomic) enforcement point.
pub fn attempt_allowed(revisada: bool, recorded_attempts: i32) -> bool {
    !revisada || recorded_attempts < MAX_REVIEWED_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reviewed_activity_caps_at_three() {
        assert!(attempt_allowed(true, 0));
        assert!(attempt_allowed(true, 2));
        assert!(!attempt_allowed(true, 3));
        assert!(!attempt_allowed(true, 4));
    }

    #[test]
    fn unreviewed_activity_is_unbounded() {
        for k in 0..10 {
            assert!(attempt_allowed(false, k));
        }
    }

    #[test]
    fn exhausted_outcome_reports_last_grade() {
        let outcome = AttemptOutcome::Exhausted { attempt_count: 3, final_grade: 4.2 };
        assert_eq!(
            outcome,
            AttemptOutcome::Exhausted { attempt_count: 3, final_grade: 4.2 }
        );
        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json["state"], "exhausted");
        assert_eq!(json["finalGrade"], 4.2);
    }
}
