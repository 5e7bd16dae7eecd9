//! HTTP reasoner client for the Anthropic messages API
//!
//! One request per call. Retries are left to the next daily run; the
//! orchestrator owns the timeout.

use super::types::{
    parse_response, AssessmentMode, ReasonerError, ReasonerReply, ReasonerRequest,
    ReasonerResponse,
};
use super::Reasoner;
use crate::config::ReasonerConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Instant;

/// Reasoner backed by a hosted model
pub struct AnthropicReasoner {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl AnthropicReasoner {
    /// Build from config, reading the key from `config.api_key_env`
    pub fn from_config(config: &ReasonerConfig) -> Result<Self, ReasonerError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ReasonerError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ReasonerConfig, api_key: String) -> Result<Self, ReasonerError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ReasonerError::Api(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt: system_prompt()?,
        })
    }

    fn extract_text(body: &serde_json::Value) -> Result<String, ReasonerError> {
        let content = body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ReasonerError::Malformed("missing 'content' array".into()))?;

        let text: Vec<&str> = content
            .iter()
            .filter(|item| item["type"] == "text")
            .filter_map(|item| item["text"].as_str())
            .collect();
        if text.is_empty() {
            return Err(ReasonerError::Malformed("no text content".into()));
        }
        Ok(text.join("\n"))
    }
}

fn system_prompt() -> Result<String, ReasonerError> {
    let schema = schemars::schema_for!(ReasonerResponse);
    let schema_json =
        serde_json::to_string_pretty(&schema).map_err(|e| ReasonerError::Api(e.to_string()))?;
    Ok(format!(
        "You assess pending merger-arbitrage deals. Reply with one JSON object \
         conforming to this schema and nothing else.\n\nJSON Schema:\n{schema_json}\n"
    ))
}

#[async_trait]
impl Reasoner for AnthropicReasoner {
    async fn assess(&self, request: &ReasonerRequest) -> Result<ReasonerReply, ReasonerError> {
        let task = match request.mode {
            AssessmentMode::Delta => "update_assessment",
            AssessmentMode::Full => "full_assessment",
        };
        let request_json =
            serde_json::to_value(request).map_err(|e| ReasonerError::Api(e.to_string()))?;
        let user_content = json!({ "task": task, "request": request_json }).to_string();

        let payload = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": self.system_prompt,
            "messages": [{ "role": "user", "content": user_content }],
        });

        let started = Instant::now();
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReasonerError::Timeout
                } else {
                    ReasonerError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasonerError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReasonerError::Malformed(e.to_string()))?;
        let raw = Self::extract_text(&body)?;

        tracing::debug!(
            deal = %request.deal,
            mode = ?request.mode,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reasoner replied"
        );

        let response = parse_response(&raw)?;
        Ok(ReasonerReply { response, raw })
    }
}
