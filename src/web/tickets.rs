use crate::db;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{EducatorSession, UserSession};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub body: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTicketRequest {
    pub assignee_id: Uuid,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(create))
        .route("/:id", get(get_one))
        .route("/:id/assign", put(assign))
        .route("/:id/close", put(close))
        .with_state(state)
}

async fn create(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateTicketRequest>,
) -> Result<Json<db::Ticket>, ApiError> {
    let subject = payload.subject.trim();
    if subject.is_empty() {
        return Err(ApiError::BadRequest("subject must not be empty".into()));
    }
    if payload.body.len() > 10_000 {
        return Err(ApiError::BadRequest("body is too long".into()));
    }
    let ticket = db::create_ticket(&state.pool, claims.user_id, subject, &payload.body).await?;
    Ok(Json(ticket))
}

async fn get_one(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Ticket>, ApiError> {
    let ticket = db::get_ticket(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("ticket"))?;
    let is_staff = matches!(
        claims.role,
        crate::domain::models::UserRole::Admin | crate::domain::models::UserRole::Educator
    );
    if !is_staff && ticket.user_id != claims.user_id {
        return Err(ApiError::Forbidden("not your ticket"));
    }
    Ok(Json(ticket))
}

/// Assign a ticket to a staff member. The notification email is best effort; a
/// mailer outage must not fail the assignment itself.
async fn assign(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignTicketRequest>,
) -> Result<Json<db::Ticket>, ApiError> {
    let assignee = db::find_user_by_id(&state.pool, payload.assignee_id)
        .await?
        .ok_or(ApiError::NotFound("assignee"))?;

    let ticket = db::assign_ticket(&state.pool, id, assignee.id)
        .await?
        .ok_or(ApiError::NotFound("ticket"))?;

    let mailer = state.mailer.clone();
    let subject = format!("Ticket assigned: {}", ticket.subject);
    let body = format!(
        "Ticket {} has been assigned to you.\n\n{}",
        ticket.id, ticket.body
    );
    tokio::spawn(async move {
        if let Err(e) = mailer.send(&assignee.email, &subject, &body).await {
            tracing::warn!("Assignment email to {} failed: {}", assignee.email, e);
        }
    });

    Ok(Json(ticket))
}

async fn close(
    EducatorSession(_claims): EducatorSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Ticket>, ApiError> {
    let ticket = db::close_ticket(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("ticket"))?;
    Ok(Json(ticket))
}
