use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use deptrag_core::config::GenerationSettings;
use deptrag_core::traits::Generator;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Generation over an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionsGenerator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
}

impl ChatCompletionsGenerator {
    /// An empty `api_key_env` disables authentication (local servers); a
    /// named variable that is unset is a configuration error.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building generation HTTP client")?;
        let api_key = if settings.api_key_env.is_empty() {
            None
        } else {
            let key = std::env::var(&settings.api_key_env)
                .map_err(|_| anyhow!("{} is not set; the generation service needs an API key", settings.api_key_env))?;
            Some(key)
        };
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "stream": false,
        });
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        debug!(model, prompt_chars = prompt.len(), "requesting completion");
        let res = req.send().await.context("generation request failed")?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            bail!("generation endpoint returned {status}: {text}");
        }
        let payload: Value = res.json().await.context("generation response is not JSON")?;
        extract_content(&payload)
    }
}

/// Pulls the answer text out of a chat-completions payload. Content may be a
/// plain string or a list of text parts.
pub fn extract_content(payload: &Value) -> Result<String> {
    let content = &payload["choices"][0]["message"]["content"];
    let text = match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => bail!("generation response has no message content"),
    };
    if text.trim().is_empty() {
        bail!("generation response content is empty");
    }
    Ok(text)
}
