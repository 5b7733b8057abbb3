use crate::db;
use crate::services::{embeddings, images};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{EducatorSession, UserSession};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateMateriaRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CoverRequest {
    pub url: String,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: Uuid,
    pub title: String,
    pub score: f64,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search))
        .route("/:id", get(get_one))
        .route("/:id/cover", post(set_cover))
        .route("/:id/materias", get(list_materias).post(create_materia))
        .with_state(state)
}

async fn list(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::Course>>, ApiError> {
    Ok(Json(db::list_courses(&state.pool).await?))
}

async fn get_one(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Course>, ApiError> {
    let course = db::get_course(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    Ok(Json(course))
}

async fn create(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<Json<db::Course>, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }
    let course = db::create_course(&state.pool, title, payload.description.as_deref()).await?;

    // Index the course for semantic search in the background; search falls back
    // to substring matching for courses without an embedding.
    if state.embeddings.is_enabled() {
        let st = state.clone();
        let course_id = course.id;
        let text = match &course.description {
            Some(desc) => format!("{}\n{}", course.title, desc),
            None => course.title.clone(),
        };
        tokio::spawn(async move {
            match st.embeddings.embed(&text).await {
                Ok(vector) => {
                    if let Err(e) = db::set_course_embedding(&st.pool, course_id, &vector).await {
                        tracing::warn!("Failed to store embedding for course {}: {}", course_id, e);
                    }
                }
                Err(e) => tracing::warn!("Embedding request failed for course {}: {}", course_id, e),
            }
        });
    }

    Ok(Json(course))
}

async fn search(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("q must not be empty".into()));
    }

    let indexed = db::list_course_embeddings(&state.pool).await?;

    if state.embeddings.is_enabled() {
        let query_vec = state
            .embeddings
            .embed(query)
            .await
            .map_err(|e| ApiError::Upstream(format!("embedding provider: {e}")))?;
        let mut hits: Vec<SearchHit> = indexed
            .into_iter()
            .filter_map(|c| {
                let emb = c.embedding?;
                let score = embeddings::cosine_similarity(&query_vec, &emb);
                Some(SearchHit {
                    id: c.id,
                    title: c.title,
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(10);
        return Ok(Json(hits));
    }

    let needle = query.to_lowercase();
    let hits = indexed
        .into_iter()
        .filter(|c| c.title.to_lowercase().contains(&needle))
        .map(|c| SearchHit {
            id: c.id,
            title: c.title,
            score: 1.0,
        })
        .take(10)
        .collect();
    Ok(Json(hits))
}

async fn set_cover(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CoverRequest>,
) -> Result<Json<db::Course>, ApiError> {
    db::get_course(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;

    let (bytes, content_type) = images::fetch_image(&payload.url)
        .await
        .map_err(|e| ApiError::Upstream(format!("cover fetch: {e}")))?;

    let ext = match content_type.as_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    };
    let cover_key = format!("covers/{}/{}.{}", id, Uuid::new_v4(), ext);
    let put_url = state
        .storage
        .presign_put(&cover_key, std::time::Duration::from_secs(300));

    let resp = reqwest::Client::new()
        .put(&put_url)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(bytes)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("cover upload: {e}")))?;
    if !resp.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "cover upload returned {}",
            resp.status()
        )));
    }

    db::set_course_cover(&state.pool, id, &cover_key).await?;
    let course = db::get_course(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    Ok(Json(course))
}

async fn list_materias(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<db::Materia>>, ApiError> {
    Ok(Json(db::list_materias(&state.pool, course_id).await?))
}

async fn create_materia(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateMateriaRequest>,
) -> Result<Json<db::Materia>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    db::get_course(&state.pool, course_id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    Ok(Json(db::create_materia(&state.pool, course_id, name).await?))
}
