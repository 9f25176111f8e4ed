//! JSON-over-HTTP calls to hosted model APIs with retry and backoff.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Parameters for one retried POST.
pub struct JsonPost<'a> {
    /// Short label used in errors and logs (e.g. `"OpenAI"`).
    pub label: &'a str,
    pub url: &'a str,
    pub headers: &'a [(&'a str, String)],
    pub body: &'a serde_json::Value,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

pub async fn post_json(req: JsonPost<'_>) -> Result<serde_json::Value> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(req.timeout_secs))
        .build()?;

    let mut last_err = None;

    for attempt in 0..=req.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(label = req.label, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut builder = client
            .post(req.url)
            .header("Content-Type", "application/json")
            .json(req.body);
        for (name, value) in req.headers {
            builder = builder.header(*name, value);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    warn!(label = req.label, %status, attempt, "transient API error");
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        req.label,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", req.label, status, body_text);
            }
            Err(e) => {
                warn!(label = req.label, attempt, error = %e, "request failed");
                last_err = Some(anyhow::anyhow!("{} connection error: {}", req.label, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", req.label)))
}
