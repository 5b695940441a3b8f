//! Improvement Client: ask an external service to rewrite a question.
//!
//! The service receives `POST <url>` with a JSON body
//!
//! ```json
//! { "question": "...", "context": "...", "chunk_id": "..." }
//! ```
//!
//! and must answer 2xx with a JSON object carrying a string
//! `improved_question`. Anything else is a [`EditorError::Service`]:
//!
//! - transport failures and timeouts;
//! - non-2xx status codes;
//! - a body that is not JSON or lacks `improved_question`.
//!
//! Every request is bounded by `improver.timeout_secs`; reqwest aborts the
//! request when it expires. Retries (`improver.max_retries`, default 0) use
//! exponential backoff and only apply to 429, 5xx and transport errors.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::ImproverConfig;
use crate::error::{EditorError, Result};

/// Fields sent to the service for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImproveRequest {
    pub question: String,
    pub context: String,
    pub chunk_id: String,
}

/// A successful suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Improvement {
    pub question: String,
}

#[async_trait]
pub trait Improver: Send + Sync {
    /// Short label for logs and `/health`.
    fn name(&self) -> &str;

    async fn improve(&self, request: &ImproveRequest) -> Result<Improvement>;
}

/// Used when no `improver.url` is configured.
pub struct DisabledImprover;

#[async_trait]
impl Improver for DisabledImprover {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn improve(&self, _request: &ImproveRequest) -> Result<Improvement> {
        Err(EditorError::Service(
            "no improvement service configured (set [improver] url)".to_string(),
        ))
    }
}

/// Client for an HTTP improvement webhook.
pub struct HttpImprover {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl HttpImprover {
    pub fn new(url: impl Into<String>, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EditorError::Service(format!("could not build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            max_retries,
        })
    }

    async fn attempt(&self, request: &ImproveRequest) -> Attempt {
        let resp = match self.client.post(&self.url).json(request).send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Retry(describe_transport_error(&e)),
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let msg = format!("service returned {}: {}", status, truncate(&body, 200));
            if status.as_u16() == 429 || status.is_server_error() {
                return Attempt::Retry(msg);
            }
            return Attempt::Fail(msg);
        }

        let json: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => return Attempt::Fail(format!("response is not JSON: {}", e)),
        };
        match parse_improvement(&json) {
            Ok(imp) => Attempt::Done(imp),
            Err(e) => Attempt::Fail(e.to_string()),
        }
    }
}

enum Attempt {
    Done(Improvement),
    Retry(String),
    Fail(String),
}

#[async_trait]
impl Improver for HttpImprover {
    fn name(&self) -> &str {
        &self.url
    }

    async fn improve(&self, request: &ImproveRequest) -> Result<Improvement> {
        let mut last_err = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            log::info!(
                "requesting improvement for chunk {} from {} (attempt {})",
                request.chunk_id,
                self.url,
                attempt + 1
            );
            match self.attempt(request).await {
                Attempt::Done(imp) => return Ok(imp),
                Attempt::Fail(msg) => return Err(EditorError::Service(msg)),
                Attempt::Retry(msg) => {
                    log::warn!("improvement attempt {} failed: {}", attempt + 1, msg);
                    last_err = msg;
                }
            }
        }

        Err(EditorError::Service(last_err))
    }
}

/// Build the improver described by `config`.
pub fn create_improver(config: &ImproverConfig) -> Result<Box<dyn Improver>> {
    match &config.url {
        Some(url) => Ok(Box::new(HttpImprover::new(
            url.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?)),
        None => Ok(Box::new(DisabledImprover)),
    }
}

/// Extract `improved_question` from a service response body.
pub fn parse_improvement(json: &serde_json::Value) -> Result<Improvement> {
    let obj = json.as_object().ok_or_else(|| {
        EditorError::Service("malformed response: expected a JSON object".to_string())
    })?;
    let question = obj
        .get("improved_question")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            EditorError::Service(
                "malformed response: missing string field 'improved_question'".to_string(),
            )
        })?;
    Ok(Improvement {
        question: question.to_string(),
    })
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("could not connect: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
