//! External-tool Client (C11): discovers remote tool servers via a
//! `tools/list` JSON-RPC-style call, scores tools by keyword match
//! against a query, and invokes the top matches in parallel with a
//! bounded timeout, returning results as pseudo-chunks.

use ragweave_common::{RagError, Result, SourceType};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub endpoint: String,
}

/// A result from an external tool invocation, shaped like a retrieval
/// chunk so the synthesizer can treat it uniformly.
#[derive(Debug, Clone)]
pub struct ToolChunk {
    pub tool_name: String,
    pub content: String,
    pub source_type: SourceType,
    pub score: f64,
}

struct ToolListCache {
    fetched_at: Instant,
    tools: Vec<ToolDescriptor>,
}

pub struct ExternalToolClient {
    http: reqwest::Client,
    server_endpoints: Vec<String>,
    cache: RwLock<Option<ToolListCache>>,
    cache_ttl: Duration,
    call_timeout: Duration,
}

impl ExternalToolClient {
    pub fn new(server_endpoints: Vec<String>, cache_ttl: Duration, call_timeout: Duration) -> Self {
        Self { http: reqwest::Client::new(), server_endpoints, cache: RwLock::new(None), cache_ttl, call_timeout }
    }

    /// Returns the cached tool list if still within TTL, otherwise
    /// re-fetches `tools/list` from every configured server.
    #[instrument(skip(self))]
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        {
            let cached = self.cache.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return entry.tools.clone();
                }
            }
        }

        let mut tools = Vec::new();
        for endpoint in &self.server_endpoints {
            match self.fetch_tools(endpoint).await {
                Ok(mut fetched) => tools.append(&mut fetched),
                Err(e) => warn!(endpoint, error = %e, "tools/list failed for server"),
            }
        }

        let mut cache = self.cache.write().await;
        *cache = Some(ToolListCache { fetched_at: Instant::now(), tools: tools.clone() });
        tools
    }

    async fn fetch_tools(&self, endpoint: &str) -> Result<Vec<ToolDescriptor>> {
        let body = serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });
        let resp = self.http.post(endpoint).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(RagError::ProviderHttp { status: resp.status().as_u16(), body: resp.text().await.unwrap_or_default() });
        }
        let value: serde_json::Value = resp.json().await.map_err(|e| RagError::Parse(e.to_string()))?;
        let raw_tools = value.get("result").and_then(|r| r.get("tools")).and_then(|t| t.as_array()).cloned().unwrap_or_default();

        Ok(raw_tools
            .into_iter()
            .filter_map(|t| {
                Some(ToolDescriptor {
                    name: t.get("name")?.as_str()?.to_string(),
                    description: t.get("description").and_then(|d| d.as_str()).unwrap_or_default().to_string(),
                    endpoint: endpoint.to_string(),
                })
            })
            .collect())
    }

    fn score_tool(query: &str, tool: &ToolDescriptor) -> usize {
        let query_lower = query.to_lowercase();
        let haystack = format!("{} {}", tool.name.to_lowercase(), tool.description.to_lowercase());
        query_lower.split_whitespace().filter(|word| haystack.contains(word)).count()
    }

    /// Scores every known tool against `query`, invokes every tool with a
    /// nonzero score in parallel under `call_timeout`, and returns
    /// successful results as pseudo-chunks with `score=1.0`. A tool that
    /// errors or times out is dropped rather than surfaced as a failure —
    /// external tools are an additional retrieval source, not a required one.
    #[instrument(skip(self, query))]
    pub async fn search(&self, query: &str) -> Vec<ToolChunk> {
        let tools = self.list_tools().await;
        let matches: Vec<&ToolDescriptor> = tools.iter().filter(|t| Self::score_tool(query, t) > 0).collect();

        let invocations = matches.into_iter().map(|tool| self.invoke(tool, query));
        let results = futures::future::join_all(invocations).await;
        results.into_iter().flatten().collect()
    }

    async fn invoke(&self, tool: &ToolDescriptor, query: &str) -> Option<ToolChunk> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": "tools/call",
            "params": { "name": tool.name, "arguments": { "query": query } },
        });

        let call = self.http.post(&tool.endpoint).json(&body).send();
        let response = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(tool = %tool.name, error = %e, "tool invocation failed");
                return None;
            }
            Err(_) => {
                warn!(tool = %tool.name, timeout_ms = self.call_timeout.as_millis() as u64, "tool invocation timed out");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(tool = %tool.name, status = %response.status(), "tool returned an error status");
            return None;
        }

        let value: serde_json::Value = response.json().await.ok()?;
        let content = value.get("result").and_then(|r| r.get("content")).and_then(|c| c.as_str())?.to_string();

        Some(ToolChunk { tool_name: tool.name.clone(), content, source_type: SourceType::External, score: 1.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_tool_counts_matching_query_words() {
        let tool = ToolDescriptor { name: "weather_lookup".to_string(), description: "get current weather for a city".to_string(), endpoint: "http://x".to_string() };
        assert_eq!(ExternalToolClient::score_tool("what is the weather in paris", &tool), 1);
        assert_eq!(ExternalToolClient::score_tool("totally unrelated query", &tool), 0);
    }

    #[tokio::test]
    async fn list_tools_caches_within_ttl() {
        let client = ExternalToolClient::new(vec![], Duration::from_secs(60), Duration::from_millis(500));
        let first = client.list_tools().await;
        assert!(first.is_empty());
        let second = client.list_tools().await;
        assert!(second.is_empty());
    }
}
