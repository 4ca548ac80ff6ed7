//! Provider Adapter (C1): a uniform embedding/generation contract over
//! OpenAI, Anthropic, Gemini, Azure OpenAI, and arbitrary OpenAI-compatible
//! ("Custom") backends.

use async_trait::async_trait;
use ragweave_common::{ProviderConfig, RagError};
use serde_json::json;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    AzureOpenAi,
    Custom,
}

/// Uniform contract every backend variant implements. `embed_batch` never
/// errors on an empty input — it returns an empty vector instead.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn generate_text(&self, prompt: &str, config: &ProviderConfig) -> Result<String>;
    async fn embed_one(&self, text: &str, config: &ProviderConfig) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Vec<f32>>>;
    fn kind(&self) -> ProviderKind;
}

fn require(opt: &Option<String>, what: &str) -> Result<String> {
    opt.clone().ok_or_else(|| RagError::ConfigMissing(what.to_string()))
}

async fn send_json(req: reqwest::RequestBuilder) -> Result<serde_json::Value> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RagError::ProviderHttp { status: status.as_u16(), body });
    }
    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| RagError::Parse(e.to_string()))
}

fn parse_openai_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| RagError::Parse("missing `data` array in embeddings response".into()))?;
    data.iter()
        .map(|item| serde_json::from_value(item["embedding"].clone()).map_err(|e| RagError::Parse(e.to_string())))
        .collect()
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

pub struct OpenAiAdapter {
    client: reqwest::Client,
}

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for OpenAiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn generate_text(&self, prompt: &str, config: &ProviderConfig) -> Result<String> {
        let api_key = require(&config.api_key, "OpenAI ApiKey")?;
        let endpoint = config.endpoint.clone().unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let url = format!("{}/chat/completions", endpoint.trim_end_matches('/'));

        let mut messages = Vec::new();
        if let Some(system) = &config.system_message {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let body = json!({
            "model": config.model.as_deref().unwrap_or("gpt-4o-mini"),
            "messages": messages,
            "max_tokens": config.max_tokens.unwrap_or(4096),
            "temperature": config.temperature.unwrap_or(0.1),
        });

        let json = send_json(self.client.post(&url).bearer_auth(&api_key).json(&body)).await?;
        Ok(json["choices"][0]["message"]["content"].as_str().unwrap_or_default().to_string())
    }

    async fn embed_one(&self, text: &str, config: &ProviderConfig) -> Result<Vec<f32>> {
        Ok(self.embed_batch(std::slice::from_ref(&text.to_string()), config).await?.into_iter().next().unwrap_or_default())
    }

    async fn embed_batch(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = require(&config.embedding_api_key.clone().or_else(|| config.api_key.clone()), "OpenAI ApiKey")?;
        let endpoint = config.endpoint.clone().unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let url = format!("{}/embeddings", endpoint.trim_end_matches('/'));
        let body = json!({
            "model": config.embedding_model.as_deref().unwrap_or("text-embedding-3-small"),
            "input": texts,
        });
        let json = send_json(self.client.post(&url).bearer_auth(&api_key).json(&body)).await?;
        parse_openai_embeddings(&json)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

/// Text uses the messages API; embeddings have no first-party endpoint and
/// delegate to a distinct embedding service keyed by `EmbeddingApiKey` /
/// `EmbeddingEndpoint`.
pub struct AnthropicAdapter {
    client: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn generate_text(&self, prompt: &str, config: &ProviderConfig) -> Result<String> {
        let api_key = require(&config.api_key, "Anthropic ApiKey")?;
        let endpoint = config.endpoint.clone().unwrap_or_else(|| "https://api.anthropic.com/v1".to_string());
        let url = format!("{}/messages", endpoint.trim_end_matches('/'));

        let body = json!({
            "model": config.model.as_deref().unwrap_or("claude-3-5-sonnet-latest"),
            "system": config.system_message.as_deref().unwrap_or_default(),
            "max_tokens": config.max_tokens.unwrap_or(4096),
            "temperature": config.temperature.unwrap_or(0.1),
            "messages": [{"role": "user", "content": prompt}],
        });

        let json = send_json(
            self.client
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body),
        )
        .await?;
        Ok(json["content"][0]["text"].as_str().unwrap_or_default().to_string())
    }

    async fn embed_one(&self, text: &str, config: &ProviderConfig) -> Result<Vec<f32>> {
        Ok(self.embed_batch(std::slice::from_ref(&text.to_string()), config).await?.into_iter().next().unwrap_or_default())
    }

    /// Anthropic has no first-party embedding endpoint; when the secondary
    /// key is missing this fails with `ConfigMissing`, per §4.1.
    async fn embed_batch(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = require(&config.embedding_api_key, "Anthropic EmbeddingApiKey")?;
        let endpoint = require(&config.embedding_endpoint, "Anthropic EmbeddingEndpoint")?;
        let url = format!("{}/embeddings", endpoint.trim_end_matches('/'));
        let body = json!({
            "model": config.embedding_model.as_deref().unwrap_or("voyage-3"),
            "input": texts,
        });
        let json = send_json(self.client.post(&url).header("x-api-key", &api_key).json(&body)).await?;
        parse_openai_embeddings(&json)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

const GEMINI_BATCH_CAP: usize = 50;
const GEMINI_INTER_BATCH_DELAY_MS: u64 = 600;

pub struct GeminiAdapter {
    client: reqwest::Client,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    async fn generate_text(&self, prompt: &str, config: &ProviderConfig) -> Result<String> {
        let api_key = require(&config.api_key, "Gemini ApiKey")?;
        let endpoint = config.endpoint.clone().unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());
        let model = config.model.as_deref().unwrap_or("gemini-1.5-flash");
        let url = format!("{}/models/{}:generateContent", endpoint.trim_end_matches('/'), model);

        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "maxOutputTokens": config.max_tokens.unwrap_or(4096),
                "temperature": config.temperature.unwrap_or(0.1),
            },
        });

        let json = send_json(self.client.post(&url).header("x-goog-api-key", &api_key).json(&body)).await?;
        Ok(json["candidates"][0]["content"]["parts"][0]["text"].as_str().unwrap_or_default().to_string())
    }

    async fn embed_one(&self, text: &str, config: &ProviderConfig) -> Result<Vec<f32>> {
        Ok(self.embed_batch(std::slice::from_ref(&text.to_string()), config).await?.into_iter().next().unwrap_or_default())
    }

    /// Splits into sub-batches of at most 50 and sleeps ≥600ms between
    /// them to respect the documented RPM, per §4.1.
    async fn embed_batch(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = require(&config.api_key, "Gemini ApiKey")?;
        let endpoint = config.endpoint.clone().unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());
        let model = config.embedding_model.as_deref().unwrap_or("text-embedding-004");
        let url = format!("{}/models/{}:batchEmbedContents", endpoint.trim_end_matches('/'), model);

        let mut out = Vec::with_capacity(texts.len());
        let mut first = true;
        for chunk in texts.chunks(GEMINI_BATCH_CAP) {
            if !first {
                tokio::time::sleep(std::time::Duration::from_millis(GEMINI_INTER_BATCH_DELAY_MS)).await;
            }
            first = false;

            let requests: Vec<_> = chunk
                .iter()
                .map(|t| json!({"model": format!("models/{}", model), "content": {"parts": [{"text": t}]}}))
                .collect();
            let body = json!({"requests": requests});

            let json = send_json(self.client.post(&url).header("x-goog-api-key", &api_key).json(&body)).await?;
            let embeddings = json["embeddings"]
                .as_array()
                .ok_or_else(|| RagError::Parse("missing `embeddings` array in Gemini response".into()))?;
            for e in embeddings {
                let values: Vec<f32> = serde_json::from_value(e["values"].clone()).map_err(|e| RagError::Parse(e.to_string()))?;
                out.push(values);
            }
        }
        Ok(out)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }
}

// ---------------------------------------------------------------------------
// Azure OpenAI
// ---------------------------------------------------------------------------

pub struct AzureOpenAiAdapter {
    client: reqwest::Client,
}

impl AzureOpenAiAdapter {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for AzureOpenAiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AzureOpenAiAdapter {
    async fn generate_text(&self, prompt: &str, config: &ProviderConfig) -> Result<String> {
        let api_key = require(&config.api_key, "Azure ApiKey")?;
        let endpoint = require(&config.endpoint, "Azure Endpoint")?;
        let deployment = require(&config.model, "Azure deployment (Model)")?;
        let api_version = config.api_version.clone().unwrap_or_else(|| "2024-06-01".to_string());
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version
        );

        let mut messages = Vec::new();
        if let Some(system) = &config.system_message {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));
        let body = json!({
            "messages": messages,
            "max_tokens": config.max_tokens.unwrap_or(4096),
            "temperature": config.temperature.unwrap_or(0.1),
        });

        let json = send_json(self.client.post(&url).header("api-key", &api_key).json(&body)).await?;
        Ok(json["choices"][0]["message"]["content"].as_str().unwrap_or_default().to_string())
    }

    async fn embed_one(&self, text: &str, config: &ProviderConfig) -> Result<Vec<f32>> {
        Ok(self.embed_batch(std::slice::from_ref(&text.to_string()), config).await?.into_iter().next().unwrap_or_default())
    }

    /// The commodity tier is rate-gated at ≤3 requests/min; the interval
    /// is enforced upstream by the Resilient Caller's gate, not here.
    async fn embed_batch(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = require(&config.embedding_api_key.clone().or_else(|| config.api_key.clone()), "Azure ApiKey")?;
        let endpoint = require(&config.embedding_endpoint.clone().or_else(|| config.endpoint.clone()), "Azure Endpoint")?;
        let deployment = require(&config.embedding_model, "Azure embedding deployment")?;
        let api_version = config.api_version.clone().unwrap_or_else(|| "2024-06-01".to_string());
        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version
        );
        let body = json!({"input": texts});
        let json = send_json(self.client.post(&url).header("api-key", &api_key).json(&body)).await?;
        parse_openai_embeddings(&json)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::AzureOpenAi
    }
}

// ---------------------------------------------------------------------------
// Custom (arbitrary OpenAI-compatible server, e.g. Ollama / vLLM)
// ---------------------------------------------------------------------------

/// Sanitizes input text before sending it to a self-hosted backend: many
/// local inference servers choke on control characters or extreme length.
pub fn sanitize_for_custom(text: &str) -> String {
    let no_nul: String = text.chars().filter(|&c| c != '\0').collect();

    let mut collapsed_dots = String::with_capacity(no_nul.len());
    let mut dot_run = 0usize;
    for c in no_nul.chars() {
        if c == '.' {
            dot_run += 1;
            if dot_run <= 3 {
                collapsed_dots.push(c);
            }
        } else {
            dot_run = 0;
            collapsed_dots.push(c);
        }
    }

    let mut result = String::with_capacity(collapsed_dots.len());
    let mut last_was_space = false;
    for c in collapsed_dots.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                result.push(' ');
            }
            last_was_space = true;
        } else if c.is_control() && c != '\n' && c != '\t' {
            // drop
        } else {
            result.push(c);
            last_was_space = false;
        }
    }

    result.chars().take(8000).collect()
}

/// `…/chat/completions` → `…/embeddings`; a loopback host with no explicit
/// chat path derives `/v1/embeddings` (the OpenAI-compatible shape, per the
/// spec's resolution of this ambiguity — see DESIGN.md).
pub fn derive_embedding_endpoint(chat_endpoint: &str) -> String {
    if let Some(prefix) = chat_endpoint.strip_suffix("/chat/completions") {
        return format!("{}/embeddings", prefix);
    }
    let trimmed = chat_endpoint.trim_end_matches('/');
    format!("{}/v1/embeddings", trimmed)
}

pub struct CustomAdapter {
    client: reqwest::Client,
}

impl CustomAdapter {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    fn parse_custom_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
        if let Some(v) = json.get("embeddings").and_then(|v| v.as_array()) {
            return v
                .iter()
                .map(|e| serde_json::from_value(e.clone()).map_err(|e| RagError::Parse(e.to_string())))
                .collect();
        }
        if json.get("embedding").is_some() {
            let v: Vec<f32> = serde_json::from_value(json["embedding"].clone()).map_err(|e| RagError::Parse(e.to_string()))?;
            return Ok(vec![v]);
        }
        if json.get("data").is_some() {
            return parse_openai_embeddings(json);
        }
        Err(RagError::Parse("unrecognized embedding response shape".into()))
    }
}

impl Default for CustomAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for CustomAdapter {
    async fn generate_text(&self, prompt: &str, config: &ProviderConfig) -> Result<String> {
        let endpoint = require(&config.endpoint, "Custom Endpoint")?;
        let url = format!("{}/chat/completions", endpoint.trim_end_matches('/'));
        let sanitized = sanitize_for_custom(prompt);

        let mut messages = Vec::new();
        if let Some(system) = &config.system_message {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": sanitized}));
        let body = json!({
            "model": config.model.as_deref().unwrap_or("default"),
            "messages": messages,
            "max_tokens": config.max_tokens.unwrap_or(4096),
            "temperature": config.temperature.unwrap_or(0.1),
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &config.api_key {
            req = req.bearer_auth(key);
        }
        let json = send_json(req).await?;
        Ok(json["choices"][0]["message"]["content"].as_str().unwrap_or_default().to_string())
    }

    async fn embed_one(&self, text: &str, config: &ProviderConfig) -> Result<Vec<f32>> {
        Ok(self.embed_batch(std::slice::from_ref(&text.to_string()), config).await?.into_iter().next().unwrap_or_default())
    }

    async fn embed_batch(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let chat_endpoint = require(&config.endpoint, "Custom Endpoint")?;
        let url = config
            .embedding_endpoint
            .clone()
            .unwrap_or_else(|| derive_embedding_endpoint(&format!("{}/chat/completions", chat_endpoint.trim_end_matches('/'))));

        let sanitized: Vec<String> = texts.iter().map(|t| sanitize_for_custom(t)).collect();
        let body = json!({
            "model": config.embedding_model.as_deref().unwrap_or("default"),
            "input": sanitized,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = config.embedding_api_key.as_ref().or(config.api_key.as_ref()) {
            req = req.bearer_auth(key);
        }
        let json = send_json(req).await?;
        Self::parse_custom_embeddings(&json)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_nul_and_collapses_dots() {
        let s = sanitize_for_custom("hi\0there.....end");
        assert!(!s.contains('\0'));
        assert_eq!(s, "hithere...end");
    }

    #[test]
    fn sanitize_collapses_whitespace_and_truncates() {
        let s = sanitize_for_custom("a   b\t\tc\n\nd");
        assert_eq!(s, "a b c d");
        let long = "x".repeat(9000);
        assert_eq!(sanitize_for_custom(&long).len(), 8000);
    }

    #[test]
    fn derive_embedding_endpoint_from_chat_path() {
        assert_eq!(derive_embedding_endpoint("http://localhost:11434/v1/chat/completions"), "http://localhost:11434/v1/embeddings");
    }

    #[test]
    fn derive_embedding_endpoint_from_loopback_host() {
        assert_eq!(derive_embedding_endpoint("http://127.0.0.1:8080"), "http://127.0.0.1:8080/v1/embeddings");
    }
}
