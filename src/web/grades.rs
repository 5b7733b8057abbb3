use crate::jobs::rollup::{self, CourseRollup};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::UserSession;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryParams {
    pub course_id: Uuid,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/summary", get(summary))
        .with_state(state)
}

/// Recompute and return the caller's standing in a course: per-parameter
/// grades, the course final, and the per-materia mirror. Computing on read
/// keeps the summary consistent with whatever attempts landed since the last
/// queued rollup.
async fn summary(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<CourseRollup>, ApiError> {
    crate::db::get_course(&state.pool, params.course_id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    let rollup = rollup::recompute_course(&state.pool, claims.user_id, params.course_id).await?;
    Ok(Json(rollup))
}
