use crate::db;
use crate::jobs;
use crate::services::cache;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{EducatorSession, UserSession};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    pub course_id: Uuid,
    pub title: String,
    pub video_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonResponse {
    #[serde(flatten)]
    pub lesson: db::Lesson,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_job_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResponse {
    pub status: crate::domain::models::TranscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", axum::routing::post(create))
        .route("/course/:course_id", get(list_for_course))
        .route("/:id", get(get_one))
        .route("/:id/transcription", get(transcription_status))
        .with_state(state)
}

async fn create(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<Json<LessonResponse>, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }
    db::get_course(&state.pool, payload.course_id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;

    let lesson = db::create_lesson(
        &state.pool,
        payload.course_id,
        title,
        payload.video_key.as_deref(),
    )
    .await?;

    // Lessons with a video get a tracked transcription job started right away.
    let mut job_id = None;
    if let Some(video_key) = payload.video_key {
        let job = db::create_transcription_job(&state.pool, lesson.id).await?;
        job_id = Some(job.id);
        jobs::transcription::spawn(state.clone(), job.id, lesson.id, video_key);
    }

    Ok(Json(LessonResponse {
        lesson,
        transcription_job_id: job_id,
    }))
}

async fn get_one(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Lesson>, ApiError> {
    let lesson = db::get_lesson(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("lesson"))?;
    Ok(Json(lesson))
}

async fn list_for_course(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<db::Lesson>>, ApiError> {
    Ok(Json(db::list_lessons(&state.pool, course_id).await?))
}

async fn transcription_status(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(lesson_id): Path<Uuid>,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    // The cached projection answers most polls without touching Postgres.
    if let Ok(Some(cached)) = state
        .cache
        .get_json::<serde_json::Value>(&cache::transcription_key(lesson_id))
        .await
    {
        if let Some(text) = cached.get("text").and_then(|t| t.as_str()) {
            return Ok(Json(TranscriptionResponse {
                status: crate::domain::models::TranscriptionStatus::Done,
                transcript: Some(text.to_string()),
                error: None,
            }));
        }
    }

    let job = db::latest_transcription_job(&state.pool, lesson_id)
        .await?
        .ok_or(ApiError::NotFound("transcription job"))?;
    Ok(Json(TranscriptionResponse {
        status: job.status,
        transcript: job.transcript,
        error: job.error,
    }))
}
