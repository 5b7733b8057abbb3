use crate::db;
use crate::domain::models::UserRole;
use crate::web::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SESSION_VERSION: &str = "v1";
const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub role: UserRole,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

pub fn sign_session(user_id: Uuid, role: UserRole, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
    let payload = format!(
        "{SESSION_VERSION}|{}|{}|{}",
        user_id,
        role.as_str(),
        exp.timestamp()
    );
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::Invalid)?;
    if sig_b64.contains('.') {
        return Err(SessionError::Invalid);
    }
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let mut pieces = payload.split('|');
    let version = pieces.next().ok_or(SessionError::Invalid)?;
    if version != SESSION_VERSION {
        return Err(SessionError::Invalid);
    }
    let user_id = pieces
        .next()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(SessionError::Invalid)?;
    let role = pieces
        .next()
        .and_then(UserRole::from_str)
        .ok_or(SessionError::Role)?;
    let exp: i64 = pieces
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(SessionError::Invalid)?;
    if pieces.next().is_some() {
        return Err(SessionError::Invalid);
    }
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims { user_id, role, exp })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                if let Some(rest) = pair.trim().strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

async fn authenticated_claims<S>(parts: &mut Parts, state: &S) -> Result<SessionClaims, ApiError>
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    let shared_state = crate::state::SharedState::from_ref(state);

    let token = extract_token(&parts.headers).ok_or(ApiError::Unauthorized)?;

    let claims = verify_session(&token, &shared_state.session_key).map_err(|e| {
        tracing::warn!("Session verification failed: {}", e);
        ApiError::Unauthorized
    })?;

    let user = db::find_user_by_id(&shared_state.pool, claims.user_id)
        .await
        .map_err(|e| {
            tracing::warn!("User lookup failed for session: {}", e);
            ApiError::Unauthorized
        })?;

    match user {
        Some(u) if u.is_active => Ok(claims),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Axum extractor for any authenticated, active user.
pub struct UserSession(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(UserSession(authenticated_claims(parts, state).await?))
    }
}

/// Axum extractor requiring the educator or admin role.
pub struct EducatorSession(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for EducatorSession
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = authenticated_claims(parts, state).await?;
        if !matches!(claims.role, UserRole::Admin | UserRole::Educator) {
            return Err(ApiError::Forbidden("educator role required"));
        }
        Ok(EducatorSession(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrip() {
        let key = b"test-session-key";
        let user_id = Uuid::new_v4();
        let token = sign_session(user_id, UserRole::Student, key).unwrap();
        let claims = verify_session(&token, key).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, UserRole::Student);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn forged_payload_fails_signature_check() {
        let key = b"test-session-key";
        let token = sign_session(Uuid::new_v4(), UserRole::Admin, key).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(format!(
            "v1|{}|ADMIN|{}",
            Uuid::new_v4(),
            (Utc::now() + Duration::hours(24)).timestamp()
        ));
        let forged = format!("{forged_payload}.{sig}");
        assert!(matches!(
            verify_session(&forged, key),
            Err(SessionError::Signature)
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = sign_session(Uuid::new_v4(), UserRole::Educator, b"key-one").unwrap();
        assert!(matches!(
            verify_session(&token, b"key-two"),
            Err(SessionError::Signature)
        ));
    }

    #[test]
    fn garbage_tokens_are_invalid() {
        assert!(matches!(
            verify_session("not-a-token", b"key"),
            Err(SessionError::Invalid)
        ));
        assert!(matches!(
            verify_session("a.b.c", b"key"),
            Err(SessionError::Invalid)
        ));
    }

    #[test]
    fn bearer_and_cookie_tokens_are_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc123".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers), Some("abc123".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            "theme=dark; session=tok456".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers), Some("tok456".to_string()));
    }
}
