use crate::db;
use crate::domain::grading::MAX_SCORE;
use crate::domain::models::ActivityKind;
use crate::jobs::rollup::RollupRequest;
use crate::services::cache;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{EducatorSession, UserSession};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);
const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(900);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    pub file_name: String,
    pub mime_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub upload_url: String,
    pub file_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub file_key: String,
    pub file_name: String,
    pub mime_type: String,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub grade: f64,
    pub feedback: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub download_url: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:id/delivery/presign", post(presign_upload))
        .route("/:id/delivery", post(register).get(download))
        .route("/:id/delivery/pending", get(pending))
        .route("/:id/delivery/:user_id/review", put(review))
        .with_state(state)
}

/// Best effort: the row in Postgres is authoritative, the snapshot only feeds
/// the review UI. A full overwrite on every transition (upload, re-upload,
/// review), never a merge.
async fn write_delivery_snapshot(state: &SharedState, delivery: &db::Delivery) {
    if let Err(e) = state
        .cache
        .set_json(
            &cache::submission_key(delivery.activity_id, delivery.user_id),
            delivery,
            cache::DEFAULT_TTL_SECS,
        )
        .await
    {
        tracing::warn!(
            "Delivery snapshot write failed for user {} activity {}: {}",
            delivery.user_id,
            delivery.activity_id,
            e
        );
    }
}

async fn file_upload_activity(
    state: &SharedState,
    activity_id: Uuid,
) -> Result<db::Activity, ApiError> {
    let activity = db::get_activity(&state.pool, activity_id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    if activity.kind != ActivityKind::FileUpload {
        return Err(ApiError::BadRequest(
            "only file upload activities accept deliveries".into(),
        ));
    }
    Ok(activity)
}

async fn presign_upload(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(activity_id): Path<Uuid>,
    Json(payload): Json<PresignRequest>,
) -> Result<Json<PresignResponse>, ApiError> {
    file_upload_activity(&state, activity_id).await?;
    if payload.file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("fileName must not be empty".into()));
    }

    // The key is server-chosen so students cannot point their delivery at
    // someone else's object.
    let file_key = format!(
        "deliveries/{}/{}/{}",
        activity_id,
        claims.user_id,
        Uuid::new_v4()
    );
    let upload_url = state.storage.presign_put(&file_key, UPLOAD_URL_TTL);
    Ok(Json(PresignResponse {
        upload_url,
        file_key,
    }))
}

async fn register(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(activity_id): Path<Uuid>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<db::Delivery>, ApiError> {
    file_upload_activity(&state, activity_id).await?;

    let expected_prefix = format!("deliveries/{}/{}/", activity_id, claims.user_id);
    if !payload.file_key.starts_with(&expected_prefix) {
        return Err(ApiError::Forbidden("file key does not belong to this delivery"));
    }

    let delivery = db::upsert_delivery(
        &state.pool,
        claims.user_id,
        activity_id,
        &payload.file_key,
        &payload.file_name,
        &payload.mime_type,
    )
    .await?;

    write_delivery_snapshot(&state, &delivery).await;

    Ok(Json(delivery))
}

async fn download(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let delivery = db::get_delivery(&state.pool, claims.user_id, activity_id)
        .await?
        .ok_or(ApiError::NotFound("delivery"))?;
    let download_url = state.storage.presign_get(&delivery.file_key, DOWNLOAD_URL_TTL);
    Ok(Json(DownloadResponse { download_url }))
}

async fn pending(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<Vec<db::Delivery>>, ApiError> {
    file_upload_activity(&state, activity_id).await?;
    Ok(Json(
        db::list_pending_deliveries(&state.pool, activity_id).await?,
    ))
}

async fn review(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Path((activity_id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<db::Delivery>, ApiError> {
    if !payload.grade.is_finite() || payload.grade < 0.0 || payload.grade > MAX_SCORE {
        return Err(ApiError::BadRequest(format!(
            "grade must be between 0 and {MAX_SCORE}"
        )));
    }
    let activity = file_upload_activity(&state, activity_id).await?;

    let delivery = db::review_delivery(
        &state.pool,
        user_id,
        activity_id,
        payload.grade,
        payload.feedback.as_deref(),
    )
    .await?
    .ok_or(ApiError::NotFound("delivery"))?;

    write_delivery_snapshot(&state, &delivery).await;

    if activity.parameter_id.is_some() {
        if let Some(course_id) = db::course_of_activity(&state.pool, activity_id).await? {
            if let Err(e) = state.rollup_tx.send(RollupRequest { user_id, course_id }) {
                tracing::error!("Rollup queue closed: {}", e);
            }
        }
    }

    Ok(Json(delivery))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DeliveryStatus;
    use chrono::Utc;

    #[test]
    fn snapshot_carries_the_full_review_state() {
        let delivery = db::Delivery {
            user_id: Uuid::nil(),
            activity_id: Uuid::nil(),
            file_key: "deliveries/a/u/f".to_string(),
            file_name: "essay.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            status: DeliveryStatus::Reviewed,
            grade: 4.5,
            feedback: Some("solid work".to_string()),
            submitted_at: Utc::now(),
        };
        let json = serde_json::to_value(&delivery).unwrap();
        assert_eq!(json["status"], "reviewed");
        assert_eq!(json["grade"], 4.5);
        assert_eq!(json["feedback"], "solid work");
        assert_eq!(json["file_key"], "deliveries/a/u/f");

        // Same key namespace as quiz submission snapshots.
        let key = cache::submission_key(delivery.activity_id, delivery.user_id);
        assert!(key.starts_with("submission:"));
    }
}
