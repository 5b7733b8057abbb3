use crate::db::{self, ActivityWrite, NewActivity};
use crate::domain::models::ActivityKind;
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
pub struct CreateActivityRequest {
    pub lesson_id: Uuid,
    pub parameter_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub title: String,
    #[serde(default)]
    pub revisada: bool,
    pub weight_pct: i16,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityRequest {
    pub title: String,
    pub revisada: bool,
    pub weight_pct: i16,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", axum::routing::post(create))
        .route("/lesson/:lesson_id", get(list_for_lesson))
        .route("/:id", get(get_one).put(update))
        .route("/:id/progress", get(progress))
        .with_state(state)
}

fn unwrap_write(result: ActivityWrite) -> Result<db::Activity, ApiError> {
    match result {
        ActivityWrite::Done(activity) => Ok(activity),
        ActivityWrite::WeightExceeded { occupied, requested } => {
            Err(ApiError::WeightExceeded { occupied, requested })
        }
    }
}

async fn create(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateActivityRequest>,
) -> Result<Json<db::Activity>, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }
    if !(0..=100).contains(&payload.weight_pct) {
        return Err(ApiError::BadRequest(
            "weightPct must be between 0 and 100".into(),
        ));
    }
    db::get_lesson(&state.pool, payload.lesson_id)
        .await?
        .ok_or(ApiError::NotFound("lesson"))?;
    if let Some(parameter_id) = payload.parameter_id {
        db::get_parameter(&state.pool, parameter_id)
            .await?
            .ok_or(ApiError::NotFound("parameter"))?;
    }

    let written = db::create_activity(
        &state.pool,
        NewActivity {
            lesson_id: payload.lesson_id,
            parameter_id: payload.parameter_id,
            kind: payload.kind,
            title,
            revisada: payload.revisada,
            weight_pct: payload.weight_pct,
        },
    )
    .await?;
    Ok(Json(unwrap_write(written)?))
}

async fn update(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateActivityRequest>,
) -> Result<Json<db::Activity>, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }
    if !(0..=100).contains(&payload.weight_pct) {
        return Err(ApiError::BadRequest(
            "weightPct must be between 0 and 100".into(),
        ));
    }
    db::get_activity(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;

    let written =
        db::update_activity(&state.pool, id, title, payload.revisada, payload.weight_pct).await?;
    Ok(Json(unwrap_write(written)?))
}

async fn get_one(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Activity>, ApiError> {
    let activity = db::get_activity(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    Ok(Json(activity))
}

/// The caller's own progress row: attempts used, last grade, completion.
async fn progress(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Progress>, ApiError> {
    db::get_activity(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    let progress = db::get_progress(&state.pool, claims.user_id, id)
        .await?
        .ok_or(ApiError::NotFound("progress"))?;
    Ok(Json(progress))
}

async fn list_for_lesson(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(lesson_id): Path<Uuid>,
) -> Result<Json<Vec<db::Activity>>, ApiError> {
    Ok(Json(
        db::list_activities_for_lesson(&state.pool, lesson_id).await?,
    ))
}
