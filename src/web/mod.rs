pub mod activities;
pub mod answers;
pub mod auth;
pub mod courses;
pub mod deliveries;
pub mod error;
pub mod grades;
pub mod lessons;
pub mod parameters;
pub mod payments;
pub mod questions;
pub mod session;
pub mod tickets;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/api/courses", courses::router(state.clone()))
        .nest("/api/lessons", lessons::router(state.clone()))
        .nest("/api/parameters", parameters::router(state.clone()))
        .nest(
            "/api/activities",
            activities::router(state.clone())
                .merge(questions::router(state.clone()))
                .merge(answers::router(state.clone()))
                .merge(deliveries::router(state.clone())),
        )
        .nest("/api/grades", grades::router(state.clone()))
        .nest("/api/tickets", tickets::router(state.clone()))
        .nest("/api/payments", payments::router(state))
}
