use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use sha2::Sha256;
use tracing::debug;

use super::{AgentRequestEventData, DispatchError, DispatchEvent, Dispatcher};
use crate::core::config::BrokerConfig;

type HmacSha256 = Hmac<Sha256>;

const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct WireEvent<'a> {
    name: &'a str,
    id: &'a str,
    data: &'a AgentRequestEventData,
    ts: i64,
}

/// Publishes events to an Inngest-compatible event API
/// (`POST {event_api}/e/{event_key}`).
pub struct InngestDispatcher {
    client: reqwest::Client,
    event_url: String,
    app_id: String,
    signing_key: Option<String>,
}

impl InngestDispatcher {
    pub fn new(config: &BrokerConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("agent-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let event_url = format!(
            "{}/e/{}",
            config.event_api.trim_end_matches('/'),
            urlencoding::encode(&config.event_key)
        );
        Ok(Self {
            client,
            event_url,
            app_id: config.app_id.clone(),
            signing_key: config.signing_key.clone(),
        })
    }
}

/// Strip the `signkey-<env>-` prefix Inngest puts on signing keys.
fn normalize_signing_key(key: &str) -> &str {
    match key.strip_prefix("signkey-") {
        Some(rest) => rest.split_once('-').map(|(_, k)| k).unwrap_or(rest),
        None => key,
    }
}

/// `t=<unix secs>&s=<hex HMAC-SHA256(body || t)>`
pub(crate) fn signature_header(
    signing_key: &str,
    body: &[u8],
    ts: i64,
) -> Result<String, DispatchError> {
    let key = normalize_signing_key(signing_key);
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| DispatchError::Signing)?;
    mac.update(body);
    mac.update(ts.to_string().as_bytes());
    Ok(format!("t={}&s={}", ts, hex::encode(mac.finalize().into_bytes())))
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[async_trait]
impl Dispatcher for InngestDispatcher {
    async fn publish(&self, event: &DispatchEvent) -> Result<(), DispatchError> {
        let now = chrono::Utc::now();
        let body = serde_json::to_vec(&WireEvent {
            name: event.name,
            id: &event.id,
            data: &event.data,
            ts: now.timestamp_millis(),
        })?;

        let mut request = self
            .client
            .post(&self.event_url)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Inngest-App", &self.app_id);
        if let Some(key) = &self.signing_key {
            request = request.header(
                "X-Inngest-Signature",
                signature_header(key, &body, now.timestamp())?,
            );
        }

        let res = request.body(body).send().await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body: truncate(text.trim()),
            });
        }

        debug!(
            "Published '{}' for request {} (HTTP {})",
            event.name,
            event.id,
            status.as_u16()
        );
        Ok(())
    }
}
