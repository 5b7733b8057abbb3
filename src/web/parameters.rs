use crate::db;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{EducatorSession, UserSession};
use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParameterRequest {
    pub course_id: Uuid,
    pub name: String,
    pub weight_pct: i16,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWeightRequest {
    pub weight_pct: i16,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", axum::routing::post(create))
        .route("/course/:course_id", get(list_for_course))
        .route("/:id", get(get_one))
        .route("/:id/weight", put(update_weight))
        .with_state(state)
}

fn validate_weight(weight_pct: i16) -> Result<(), ApiError> {
    if !(0..=100).contains(&weight_pct) {
        return Err(ApiError::BadRequest(
            "weightPct must be between 0 and 100".into(),
        ));
    }
    Ok(())
}

async fn create(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateParameterRequest>,
) -> Result<Json<db::Parameter>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    validate_weight(payload.weight_pct)?;
    db::get_course(&state.pool, payload.course_id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    let parameter =
        db::create_parameter(&state.pool, payload.course_id, name, payload.weight_pct).await?;
    Ok(Json(parameter))
}

async fn get_one(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Parameter>, ApiError> {
    let parameter = db::get_parameter(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("parameter"))?;
    Ok(Json(parameter))
}

async fn list_for_course(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<db::Parameter>>, ApiError> {
    Ok(Json(db::list_parameters(&state.pool, course_id).await?))
}

async fn update_weight(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWeightRequest>,
) -> Result<Json<db::Parameter>, ApiError> {
    validate_weight(payload.weight_pct)?;
    db::get_parameter(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("parameter"))?;
    db::update_parameter_weight(&state.pool, id, payload.weight_pct).await?;
    let parameter = db::get_parameter(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("parameter"))?;
    Ok(Json(parameter))
}
