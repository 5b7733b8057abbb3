use anyhow::{anyhow, Result};
use std::time::Duration;

/// Thin client for the transactional email provider's JSON API. Callers that
/// treat delivery as best-effort log the error and move on; nothing in the
/// request path depends on a mail having been sent.
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    api_url: Option<String>,
    api_key: String,
    from: String,
}

impl Mailer {
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("MAILER_API_URL").ok();
        if api_url.is_none() {
            tracing::warn!("MAILER_API_URL not set, outgoing email disabled");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_url,
            api_key: std::env::var("MAILER_API_KEY").unwrap_or_default(),
            from: std::env::var("MAILER_FROM")
                .unwrap_or_else(|_| "no-reply@aula.example".to_string()),
        })
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let Some(api_url) = &self.api_url else {
            return Err(anyhow!("mailer disabled"));
        };
        self.http
            .post(api_url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "text": body,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
