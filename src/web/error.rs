use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error surface of the API. Every variant maps to a stable `error` code in
/// the JSON body so clients branch on codes, never on message text.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("attempt limit reached")]
    AttemptsExhausted { attempt_count: i32, final_grade: f64 },
    #[error("activity weights under this parameter would exceed 100")]
    WeightExceeded { occupied: i64, requested: i16 },
    #[error("too many requests")]
    RateLimited,
    #[error("upstream service unavailable")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "bad_request", "message": message }),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "unauthorized", "message": "authentication required" }),
            ),
            ApiError::Forbidden(message) => (
                StatusCode::FORBIDDEN,
                json!({ "error": "forbidden", "message": message }),
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "not_found", "message": format!("{resource} not found") }),
            ),
            // Distinguishable from plain forbidden: the client renders a
            // locked state with the last grade on file.
            ApiError::AttemptsExhausted { attempt_count, final_grade } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": "attempts_exhausted",
                    "message": "attempt limit reached for this activity",
                    "attemptsExhausted": true,
                    "attemptCount": attempt_count,
                    "finalGrade": final_grade,
                }),
            ),
            ApiError::WeightExceeded { occupied, requested } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "weight_exceeded",
                    "message": "activity weights under this parameter would exceed 100",
                    "occupied": occupied,
                    "requested": requested,
                }),
            ),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": "rate_limited", "message": "too many requests" }),
            ),
            ApiError::Upstream(service) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "upstream_unavailable", "message": format!("{service} unavailable") }),
            ),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal", "message": "internal error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_response_is_distinguishable_from_forbidden() {
        let exhausted =
            ApiError::AttemptsExhausted { attempt_count: 3, final_grade: 4.2 }.into_response();
        let forbidden = ApiError::Forbidden("educator role required").into_response();
        assert_eq!(exhausted.status(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        // Bodies differ by the stable error code; assert the variants map to
        // the intended statuses at least.
        assert_eq!(
            ApiError::WeightExceeded { occupied: 80, requested: 30 }
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
