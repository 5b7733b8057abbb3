use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Default TTL for projections. Every cache entry is regenerable from Postgres,
/// so nothing here is allowed to live forever.
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

pub fn questions_key(activity_id: Uuid) -> String {
    format!("questions:{activity_id}")
}

pub fn submission_key(activity_id: Uuid, user_id: Uuid) -> String {
    format!("submission:{activity_id}:{user_id}")
}

pub fn transcription_key(lesson_id: Uuid) -> String {
    format!("transcription:{lesson_id}")
}

/// Client for a managed REST key-value store (GET /get/:key, POST /set/:key
/// with a bearer token). The database is authoritative; every write here is
/// best-effort and callers only log failures.
#[derive(Clone)]
pub struct CacheClient {
    http: reqwest::Client,
    base_url: Option<String>,
    token: String,
}

#[derive(serde::Deserialize)]
struct RestResult {
    result: Option<String>,
}

impl CacheClient {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CACHE_REST_URL")
            .ok()
            .map(|u| u.trim_end_matches('/').to_string());
        let token = std::env::var("CACHE_REST_TOKEN").unwrap_or_default();
        if base_url.is_none() {
            tracing::warn!("CACHE_REST_URL not set, cache disabled");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, base_url, token })
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(base) = &self.base_url else {
            return Ok(None);
        };
        let resp = self
            .http
            .get(format!("{base}/get/{key}"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        let body: RestResult = resp.json().await?;
        match body.result {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Full overwrite of the value under `key`. There is no merge: callers
    /// re-supply every field of the snapshot.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let Some(base) = &self.base_url else {
            return Ok(());
        };
        let raw = serde_json::to_string(value)?;
        self.http
            .post(format!("{base}/set/{key}?EX={ttl_secs}"))
            .bearer_auth(&self.token)
            .body(raw)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| anyhow!("cache set failed: {e}"))?;
        Ok(())
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        let Some(base) = &self.base_url else {
            return Ok(());
        };
        self.http
            .post(format!("{base}/del/{key}"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_and_stable() {
        let activity = Uuid::nil();
        let user = Uuid::nil();
        assert_eq!(
            questions_key(activity),
            "questions:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            submission_key(activity, user),
            "submission:00000000-0000-0000-0000-000000000000:00000000-0000-0000-0000-000000000000"
        );
        assert!(transcription_key(Uuid::nil()).starts_with("transcription:"));
    }
}
