use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

const MAX_RETRIES: u32 = 2;
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build image fetch client")
});

/// Download a cover image from an external URL. Retries transient failures
/// with exponential backoff plus jitter, capped at 2 retries.
pub async fn fetch_image(url: &str) -> Result<(Vec<u8>, String)> {
    let mut attempt = 0u32;
    loop {
        match try_fetch(url).await {
            Ok(result) => return Ok(result),
            Err(err) => {
                attempt += 1;
                if attempt > MAX_RETRIES {
                    return Err(err);
                }
                let jitter = rand::thread_rng().gen_range(0..250);
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1) + jitter);
                tracing::warn!("Image fetch failed (attempt {attempt}): {err}, retrying in {backoff:?}");
                sleep(backoff).await;
            }
        }
    }
}

async fn try_fetch(url: &str) -> Result<(Vec<u8>, String)> {
    let resp = HTTP.get(url).send().await?.error_for_status()?;

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(anyhow!("not an image: content type {content_type:?}"));
    }

    let bytes = resp.bytes().await?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(anyhow!("image exceeds {} bytes", MAX_IMAGE_BYTES));
    }
    Ok((bytes.to_vec(), content_type))
}
