use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Webhook body as the gateway posts it. `external_reference` carries our
/// (user, course) correlation set when the checkout was created.
#[derive(Debug, Deserialize)]
pub struct GatewayEvent {
    pub reference: String,
    pub status: String,
    pub amount_cents: i64,
    pub currency: String,
    pub user_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
}

/// Hex HMAC-SHA256 of the raw webhook body; the gateway sends it in the
/// `X-Signature` header.
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn verify_signature(secret: &[u8], payload: &[u8], signature_hex: &str) -> bool {
    let Some(signature) = decode_hex(signature_hex) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&input[i..i + 2], 16).ok())
        .collect()
}

/// Reporting API of the payment gateway. Reconciliation queries can be slow on
/// the gateway side, hence the generous client timeout.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct GatewayPayment {
    pub reference: String,
    pub status: String,
    pub amount_cents: i64,
    pub currency: String,
}

impl GatewayClient {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("PAYMENTS_API_URL")
            .map_err(|_| anyhow!("PAYMENTS_API_URL missing"))?
            .trim_end_matches('/')
            .to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: std::env::var("PAYMENTS_API_KEY").unwrap_or_default(),
        })
    }

    pub async fn fetch_payment(&self, reference: &str) -> Result<GatewayPayment> {
        let payment = self
            .http
            .get(format!("{}/v1/payments/{}", self.base_url, reference))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrip_verifies() {
        let secret = b"webhook-secret";
        let payload = br#"{"reference":"pm_1","status":"approved","amount_cents":4900,"currency":"USD"}"#;
        let signature = sign_payload(secret, payload);
        assert!(verify_signature(secret, payload, &signature));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let secret = b"webhook-secret";
        let signature = sign_payload(secret, b"original");
        assert!(!verify_signature(secret, b"tampered", &signature));
        assert!(!verify_signature(b"other-secret", b"original", &signature));
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!(!verify_signature(b"secret", b"payload", "zz"));
        assert!(!verify_signature(b"secret", b"payload", "abc"));
        assert!(!verify_signature(b"secret", b"payload", ""));
    }
}
