use crate::db;
use crate::domain::attempts::{attempt_allowed, AttemptOutcome};
use crate::domain::grading::{self, AnsweredQuestion};
use crate::jobs::rollup::RollupRequest;
use crate::services::cache;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SaveAnswersRequest {
    pub answers: HashMap<String, AnsweredQuestion>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswersResponse {
    pub score: f64,
    pub passed: bool,
    pub attempt_count: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionSnapshot<'a> {
    score: f64,
    passed: bool,
    attempt_count: i32,
    answers: &'a HashMap<String, AnsweredQuestion>,
    submitted_at: chrono::DateTime<Utc>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:id/answers", post(save_answers))
        .with_state(state)
}

/// Grade a quiz submission and record the attempt. The attempt cap lives in
/// the database upsert, so concurrent submissions cannot exceed it.
async fn save_answers(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(activity_id): Path<Uuid>,
    Json(payload): Json<SaveAnswersRequest>,
) -> Result<Json<SaveAnswersResponse>, ApiError> {
    let limiter_key = format!("submit:{}", claims.user_id);
    if !state.submit_limiter.check(&limiter_key).await {
        tracing::warn!("Submission rate limit hit for user {}", claims.user_id);
        return Err(ApiError::RateLimited);
    }

    let activity = db::get_activity(&state.pool, activity_id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    if !activity.kind.has_question_bank() {
        return Err(ApiError::BadRequest(
            "file upload activities are submitted as deliveries".into(),
        ));
    }

    // Cheap short-circuit; the upsert below is the authoritative check.
    if activity.revisada {
        if let Some(progress) = db::get_progress(&state.pool, claims.user_id, activity_id).await? {
            if !attempt_allowed(true, progress.attempt_count) {
                return Err(ApiError::AttemptsExhausted {
                    attempt_count: progress.attempt_count,
                    final_grade: progress.final_grade,
                });
            }
        }
    }

    let outcome = grading::calculate_weighted_score(&payload.answers);

    let attempt = db::record_attempt(
        &state.pool,
        claims.user_id,
        activity_id,
        outcome.score,
        activity.revisada,
    )
    .await?;

    let attempt_count = match attempt {
        AttemptOutcome::Recorded { attempt_count, .. } => attempt_count,
        AttemptOutcome::Exhausted {
            attempt_count,
            final_grade,
        } => {
            return Err(ApiError::AttemptsExhausted {
                attempt_count,
                final_grade,
            });
        }
    };

    // Best effort: the snapshot only feeds the review UI, the grade itself is
    // already durable in Postgres.
    let snapshot = SubmissionSnapshot {
        score: outcome.score,
        passed: outcome.passed,
        attempt_count,
        answers: &payload.answers,
        submitted_at: Utc::now(),
    };
    if let Err(e) = state
        .cache
        .set_json(
            &cache::submission_key(activity_id, claims.user_id),
            &snapshot,
            cache::DEFAULT_TTL_SECS,
        )
        .await
    {
        tracing::warn!(
            "Submission snapshot write failed for user {} activity {}: {}",
            claims.user_id,
            activity_id,
            e
        );
    }

    if activity.parameter_id.is_some() {
        if let Some(course_id) = db::course_of_activity(&state.pool, activity_id).await? {
            if let Err(e) = state.rollup_tx.send(RollupRequest {
                user_id: claims.user_id,
                course_id,
            }) {
                tracing::error!("Rollup queue closed: {}", e);
            }
        }
    }

    Ok(Json(SaveAnswersResponse {
        score: outcome.score,
        passed: outcome.passed,
        attempt_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_payload_grades_half_right_as_two_point_five() {
        let payload: SaveAnswersRequest = serde_json::from_str(
            r#"{
                "answers": {
                    "q1": { "isCorrect": true, "pesoPregunta": 1 },
                    "q2": { "isCorrect": false, "pesoPregunta": 1 }
                }
            }"#,
        )
        .unwrap();
        let outcome = grading::calculate_weighted_score(&payload.answers);
        assert_eq!(outcome.score, 2.5);
        assert!(!outcome.passed);
    }

    #[test]
    fn missing_weight_defaults_to_one() {
        let payload: SaveAnswersRequest = serde_json::from_str(
            r#"{ "answers": { "q1": { "isCorrect": true } } }"#,
        )
        .unwrap();
        let outcome = grading::calculate_weighted_score(&payload.answers);
        assert_eq!(outcome.score, 5.0);
        assert!(outcome.passed);
    }
}
