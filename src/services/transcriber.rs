use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

/// Client for the external video-to-text service. The request itself can run
/// for minutes; the surrounding job applies the hard timeout, this client only
/// bounds a single HTTP exchange and retries transient failures.
#[derive(Clone)]
pub struct Transcriber {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct TranscriptResponse {
    text: String,
}

impl Transcriber {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("TRANSCRIBER_URL")
            .map_err(|_| anyhow!("TRANSCRIBER_URL missing"))?
            .trim_end_matches('/')
            .to_string();
        let api_key = std::env::var("TRANSCRIBER_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self { http, base_url, api_key })
    }

    /// Ask the service to transcribe the media at `source_url` (a presigned
    /// GET for the lesson video). Up to 2 retries with exponential backoff,
    /// matching the policy for other external calls.
    pub async fn transcribe(&self, source_url: &str) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            let result = self
                .http
                .post(format!("{}/v1/transcriptions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&serde_json::json!({ "source": source_url }))
                .send()
                .await
                .and_then(|resp| resp.error_for_status());

            match result {
                Ok(resp) => {
                    let body: TranscriptResponse = resp.json().await?;
                    return Ok(body.text);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt > 2 {
                        return Err(anyhow!("transcription service error: {err}"));
                    }
                    tracing::warn!("Transcription request failed (attempt {attempt}): {err}");
                    sleep(Duration::from_millis(500 * 2u64.pow(attempt))).await;
                }
            }
        }
    }
}
