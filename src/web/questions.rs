use crate::db::{self, NewQuestion};
use crate::domain::models::QuestionKind;
use crate::services::cache;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{EducatorSession, UserSession};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(alias = "pesoPregunta")]
    pub weight: f64,
    pub answer: serde_json::Value,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:id/questions", get(list).put(replace))
        .with_state(state)
}

/// Replace the whole question bank. Postgres is authoritative; the cache only
/// holds a projection that is refreshed after the commit and healed by the
/// hourly backfill if the refresh is missed.
async fn replace(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Path(activity_id): Path<Uuid>,
    Json(payload): Json<Vec<QuestionInput>>,
) -> Result<Json<Vec<db::Question>>, ApiError> {
    let activity = db::get_activity(&state.pool, activity_id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    if !activity.kind.has_question_bank() {
        return Err(ApiError::BadRequest(
            "file upload activities have no question bank".into(),
        ));
    }
    for (i, q) in payload.iter().enumerate() {
        if q.prompt.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("question {i} has an empty prompt")));
        }
        if !q.weight.is_finite() || q.weight <= 0.0 {
            return Err(ApiError::BadRequest(format!(
                "question {i} has an invalid weight"
            )));
        }
    }

    let new_questions: Vec<NewQuestion<'_>> = payload
        .iter()
        .map(|q| NewQuestion {
            kind: q.kind,
            prompt: &q.prompt,
            weight: q.weight,
            answer: &q.answer,
        })
        .collect();

    let saved = db::replace_questions(&state.pool, activity_id, &new_questions).await?;

    let key = cache::questions_key(activity_id);
    let projection = if saved.is_empty() {
        state.cache.del(&key).await
    } else {
        state.cache.set_json(&key, &saved, cache::DEFAULT_TTL_SECS).await
    };
    if let Err(e) = projection {
        tracing::warn!("Question projection write failed for {}: {}", activity_id, e);
    }

    Ok(Json(saved))
}

/// Read-through: serve the cached projection when present, otherwise read
/// Postgres and repopulate.
async fn list(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<Vec<db::Question>>, ApiError> {
    let key = cache::questions_key(activity_id);
    match state.cache.get_json::<Vec<db::Question>>(&key).await {
        Ok(Some(cached)) => return Ok(Json(cached)),
        Ok(None) => {}
        Err(e) => tracing::warn!("Question projection read failed for {}: {}", activity_id, e),
    }

    db::get_activity(&state.pool, activity_id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    let questions = db::list_questions(&state.pool, activity_id).await?;

    if !questions.is_empty() {
        if let Err(e) = state
            .cache
            .set_json(&key, &questions, cache::DEFAULT_TTL_SECS)
            .await
        {
            tracing::warn!("Question projection write failed for {}: {}", activity_id, e);
        }
    }

    Ok(Json(questions))
}
