//! `Agent`: the library facade wiring the Provider Adapter, Resilient
//! Caller, Document Registry, Embedding Batcher, Retrieval Engine, Query
//! Router, RAG Synthesizer, Conversation Store, and External-tool Client
//! into the `upload`/`query`/document-admin surface named by §6. No HTTP
//! layer lives here — that is a deliberately absent outer surface.

use crate::config::{AiConfig, AiProvider, Config, StorageProvider};
use ragweave_common::{
    Document, ProviderConfig, RagError, RagResponse, RetrievalHit, RetrievalResult, Role,
    ScoreComponents, Session, SessionMessage,
};
use ragweave_ingestion::{
    BatcherConfig, ChunkerConfig, EmbeddingBatcher, IngestOutcome, IngestionPipeline,
    IngestionRepository, RegenerateSummary, UploadRequest,
};
use ragweave_provider::{
    AnthropicAdapter, AzureOpenAiAdapter, CustomAdapter, FallbackChain, GeminiAdapter,
    OpenAiAdapter, ProviderAdapter, ResilientCaller,
};
use ragweave_retrieval::{RetrievalConfig, RetrievalEngine};
use ragweave_router::classification::ToolDescriptor as RouterToolDescriptor;
use ragweave_router::{Intent, QueryRouter, RouteOutcome, RouterContext, SessionControl};
use ragweave_store::{
    ChunkStore, ConversationStore, Database, DocumentRepository, InMemoryChunkStore,
    InMemorySessionStore, LanceChunkStore,
};
use ragweave_synth::Synthesizer;
use ragweave_tools::ExternalToolClient;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Every provider adapter talks in a fixed-width vector space for this
/// build. A stored chunk whose embedding has a different length is
/// treated as stale by `has_valid_embedding`, per §8.
const EMBEDDING_DIM: usize = 1536;
const HISTORY_MAX_TURNS: usize = 50;
const HISTORY_MAX_TOKENS: usize = 4000;

pub struct QueryRequest {
    pub text: String,
    pub session_id: Option<Uuid>,
    pub max_results: usize,
    pub start_new: bool,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self { text: String::new(), session_id: None, max_results: 5, start_new: false }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentStats {
    pub document_count: u64,
    pub chunk_count: u64,
    pub embedding_coverage_percent: f64,
}

fn build_adapter(provider: AiProvider) -> Arc<dyn ProviderAdapter> {
    match provider {
        AiProvider::OpenAi => Arc::new(OpenAiAdapter::new()),
        AiProvider::Anthropic => Arc::new(AnthropicAdapter::new()),
        AiProvider::Gemini => Arc::new(GeminiAdapter::new()),
        AiProvider::AzureOpenAi => Arc::new(AzureOpenAiAdapter::new()),
        AiProvider::Custom => Arc::new(CustomAdapter::new()),
    }
}

fn to_provider_config(ai: &AiConfig) -> ProviderConfig {
    ProviderConfig {
        api_key: ai.api_key.clone(),
        endpoint: ai.endpoint.clone(),
        model: ai.model.clone(),
        embedding_model: ai.embedding_model.clone(),
        embedding_api_key: ai.embedding_api_key.clone(),
        embedding_endpoint: ai.embedding_endpoint.clone(),
        max_tokens: ai.max_tokens,
        temperature: ai.temperature,
        system_message: ai.system_message.clone(),
        api_version: ai.api_version.clone(),
        embedding_min_interval_ms: ai.embedding_min_interval_ms,
    }
}

fn database_query_stub(text: &str, session_id: Uuid) -> RagResponse {
    RagResponse {
        query: text.to_string(),
        answer: "Database querying is routed but not executed in this build; SQL generation over the configured connections is out of scope.".to_string(),
        sources: Vec::new(),
        session_id,
        searched_at: chrono::Utc::now(),
        extractive: false,
    }
}

pub struct Agent {
    repo: Arc<IngestionRepository>,
    pipeline: IngestionPipeline,
    retrieval: RetrievalEngine,
    synthesizer: Synthesizer,
    router: QueryRouter,
    conversations: Arc<dyn ConversationStore>,
    tools: Option<Arc<ExternalToolClient>>,
    caller: Arc<ResilientCaller>,
    provider_config: ProviderConfig,
}

impl Agent {
    /// Wires every component from a loaded `Config`. Opens (and, if
    /// absent, creates) the document database at `storage.path`
    /// (`./ragweave-data` if unset) regardless of the chosen chunk-store
    /// backend — see DESIGN.md for why document identity always persists
    /// through the one repository this workspace ships.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let adapter = build_adapter(config.ai.provider);
        Self::new_with_adapter(config, adapter).await
    }

    /// Same wiring as `new`, but with the primary provider adapter supplied
    /// directly instead of built from `config.ai.provider` — the seam tests
    /// use to swap in a `FakeProviderAdapter`.
    pub async fn new_with_adapter(config: Config, adapter: Arc<dyn ProviderAdapter>) -> anyhow::Result<Self> {
        Self::new_with_adapters(config, adapter, None).await
    }

    /// Same wiring as `new_with_adapter`, additionally letting tests swap in
    /// fake fallback adapters instead of the ones `config.fallback` would
    /// otherwise build from `AiProvider`.
    pub async fn new_with_adapters(
        config: Config,
        adapter: Arc<dyn ProviderAdapter>,
        fallback_adapters: Option<Vec<Arc<dyn ProviderAdapter>>>,
    ) -> anyhow::Result<Self> {
        let provider_config = to_provider_config(&config.ai);
        let mut caller = ResilientCaller::new(adapter).with_retry(
            config.retry.retry_policy,
            config.retry.max_retry_attempts,
            config.retry.retry_delay_ms,
        );
        if config.fallback.enable_fallback_providers {
            let providers = fallback_adapters
                .unwrap_or_else(|| config.fallback.fallback_providers.iter().copied().map(build_adapter).collect());
            if !providers.is_empty() {
                caller = caller.with_fallbacks(FallbackChain::new(providers));
            }
        }
        if let Some(interval_ms) = config.ai.embedding_min_interval_ms {
            caller = caller.with_gate("primary", Duration::from_millis(interval_ms));
        }
        let caller = Arc::new(caller);

        let db_path = config.storage.path.clone().unwrap_or_else(|| "./ragweave-data".to_string());
        let db = Arc::new(Database::open(&db_path, EMBEDDING_DIM).await?);
        db.initialize().await?;
        let documents = Arc::new(DocumentRepository::new(db.clone()));

        let chunk_store: Arc<dyn ChunkStore> = match config.storage.provider {
            StorageProvider::InMemory => Arc::new(InMemoryChunkStore::new()),
            StorageProvider::FileSystem => Arc::new(LanceChunkStore::new(db.clone())),
            other => anyhow::bail!("storage provider {other:?} is not implemented in this build"),
        };

        let repo = Arc::new(IngestionRepository::new(documents, chunk_store.clone()));

        let batcher = Arc::new(EmbeddingBatcher::new(caller.clone(), provider_config.clone(), BatcherConfig::default()));
        let chunker_config = ChunkerConfig {
            max_chunk_size: config.chunking.max_chunk_size,
            min_chunk_size: config.chunking.min_chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
        };
        let pipeline = IngestionPipeline::new(repo.clone(), batcher, chunker_config);

        let retrieval = RetrievalEngine::new(chunk_store, RetrievalConfig::default());
        let synthesizer = Synthesizer::new(caller.clone(), 10);
        let router = QueryRouter::new(caller.clone(), provider_config.clone());
        let conversations: Arc<dyn ConversationStore> = Arc::new(InMemorySessionStore::new());

        let tools = (config.mcp.enable_mcp_search && !config.mcp.mcp_servers.is_empty())
            .then(|| Arc::new(ExternalToolClient::new(config.mcp.mcp_servers.clone(), Duration::from_secs(300), Duration::from_secs(10))));

        Ok(Self { repo, pipeline, retrieval, synthesizer, router, conversations, tools, caller, provider_config })
    }

    /// Starts the folder watcher and spawns its ingest loop. The caller
    /// must keep the returned `RecommendedWatcher` alive — dropping it
    /// stops the watch.
    pub fn watch_folders(self: &Arc<Self>, base_dir: &str, folders: &[String]) -> anyhow::Result<notify::RecommendedWatcher> {
        let watcher_config = ragweave_ingestion::WatcherConfig {
            base_dir: std::path::PathBuf::from(base_dir),
            watched_folders: folders.iter().map(std::path::PathBuf::from).collect(),
            ..Default::default()
        };
        let (watcher, mut jobs) = ragweave_ingestion::folder_watcher::start(watcher_config)?;

        let agent = self.clone();
        tokio::spawn(async move {
            while let Some(job) = jobs.recv().await {
                match job.kind {
                    ragweave_ingestion::JobKind::CreatedOrChanged => {
                        let Some(file_name) = job.path.file_name().and_then(|f| f.to_str()) else { continue };
                        match std::fs::read(&job.path) {
                            Ok(content) => {
                                let request = UploadRequest {
                                    owner_id: "folder-watcher".to_string(),
                                    file_name: file_name.to_string(),
                                    content_type: "text/plain".to_string(),
                                    language: None,
                                    content,
                                    metadata: HashMap::new(),
                                };
                                if let Err(e) = agent.upload(request).await {
                                    warn!(path = %job.path.display(), error = %e, "folder watcher ingest failed");
                                }
                            }
                            Err(e) => warn!(path = %job.path.display(), error = %e, "folder watcher could not read file"),
                        }
                    }
                    // TODO: index watched paths to document ids so a delete event can
                    // cascade to `delete_document` instead of only being logged.
                    ragweave_ingestion::JobKind::Deleted => {
                        warn!(path = %job.path.display(), "folder watcher saw a delete with no path-to-document index to act on");
                    }
                }
            }
        });

        Ok(watcher)
    }

    #[instrument(skip(self, request))]
    pub async fn upload(&self, request: UploadRequest) -> Result<IngestOutcome, RagError> {
        self.pipeline.upload(request).await
    }

    /// Routes and answers one query, appending both turns to the
    /// session's conversation log.
    #[instrument(skip(self, request), fields(text = %request.text))]
    pub async fn query(&self, request: QueryRequest) -> Result<RagResponse, RagError> {
        let QueryRequest { text, session_id, max_results, start_new } = request;

        let mut session_id = match session_id {
            Some(id) => id,
            None => self.conversations.create_session().await?,
        };
        if start_new {
            session_id = self.conversations.reset(session_id).await?;
        }

        self.conversations.append(session_id, SessionMessage::new(Role::User, &text), HISTORY_MAX_TURNS, HISTORY_MAX_TOKENS).await?;

        let document_count = self.repo.document_count().await?;
        // Schema introspection is out of scope (§1), so a `DatabaseQuery`
        // classification can only ever come from the LLM fallback route,
        // never the deterministic schema-term rule.
        let schema_terms: Vec<String> = Vec::new();
        let tool_descriptors = self.router_tool_descriptors().await;
        let ctx = RouterContext { has_documents: document_count > 0, database_schema_terms: &schema_terms, tools: &tool_descriptors };

        let outcome = self.router.route(&text, &ctx).await?;
        let history = Session { id: session_id, messages: self.conversations.history(session_id).await?, created_at: chrono::Utc::now() };

        let response = match outcome {
            RouteOutcome::SessionControl(_) => {
                let new_id = self.conversations.reset(session_id).await?;
                RagResponse {
                    query: text.clone(),
                    answer: "Session reset.".to_string(),
                    sources: Vec::new(),
                    session_id: new_id,
                    searched_at: chrono::Utc::now(),
                    extractive: false,
                }
            }
            RouteOutcome::Intent(Intent::Chat) => self.chat_reply(&text, session_id, &history).await?,
            RouteOutcome::Intent(Intent::DatabaseQuery) => database_query_stub(&text, session_id),
            RouteOutcome::Intent(intent) => self.document_or_tool_reply(&text, session_id, &history, max_results, intent).await?,
        };

        self.conversations.append(session_id, SessionMessage::new(Role::Assistant, &response.answer), HISTORY_MAX_TURNS, HISTORY_MAX_TOKENS).await?;
        Ok(response)
    }

    async fn router_tool_descriptors(&self) -> Vec<RouterToolDescriptor> {
        let Some(client) = &self.tools else { return Vec::new() };
        client
            .list_tools()
            .await
            .into_iter()
            .map(|t| RouterToolDescriptor { name: t.name, keywords: t.description.split_whitespace().map(|w| w.to_lowercase()).collect() })
            .collect()
    }

    async fn chat_reply(&self, text: &str, session_id: Uuid, history: &Session) -> Result<RagResponse, RagError> {
        let mut prompt = String::new();
        for message in &history.messages {
            prompt.push_str(&format!("{:?}: {}\n", message.role, message.text));
        }
        prompt.push_str(&format!("User: {text}\nAssistant:"));
        let answer = self.caller.generate_text(&prompt, &self.provider_config).await?;
        Ok(RagResponse { query: text.to_string(), answer, sources: Vec::new(), session_id, searched_at: chrono::Utc::now(), extractive: false })
    }

    async fn document_or_tool_reply(&self, text: &str, session_id: Uuid, history: &Session, max_results: usize, intent: Intent) -> Result<RagResponse, RagError> {
        let token = CancellationToken::new();
        let query_embedding = self.caller.embed_batch(std::slice::from_ref(&text.to_string()), &self.provider_config).await?.into_iter().next().unwrap_or_default();

        let mut retrieval: RetrievalResult = self.retrieval.retrieve(text, &query_embedding, Some(max_results), &token).await?;

        if matches!(intent, Intent::DocumentRag) {
            let top_score = retrieval.hits.first().map(|hit| hit.score).unwrap_or(0.0);
            if !self.router.above_threshold(top_score) && !self.router.looks_like_continuation(text) {
                return self.chat_reply(text, session_id, history).await;
            }
        }

        if matches!(intent, Intent::ExternalTool | Intent::Mixed) {
            if let Some(client) = &self.tools {
                let tool_hits = client.search(text).await;
                retrieval.hits.extend(tool_hits.into_iter().map(|chunk| RetrievalHit {
                    chunk_id: Uuid::new_v4(),
                    document_id: Uuid::new_v4(),
                    chunk_index: 0,
                    content: format!("[{}] {}", chunk.tool_name, chunk.content),
                    score: chunk.score,
                    components: ScoreComponents { semantic: chunk.score, lexical: chunk.score },
                    source_type: chunk.source_type,
                }));
            }
        }

        let file_names = self.file_name_map(&retrieval).await;
        Ok(self.synthesizer.synthesize(text, &retrieval, history, session_id, &file_names, &self.provider_config).await)
    }

    async fn file_name_map(&self, retrieval: &RetrievalResult) -> HashMap<Uuid, String> {
        let mut map = HashMap::new();
        let mut seen = HashSet::new();
        for hit in &retrieval.hits {
            if !seen.insert(hit.document_id) {
                continue;
            }
            if let Ok(Some(document)) = self.repo.find_by_id(hit.document_id).await {
                map.insert(hit.document_id, document.file_name);
            }
        }
        map
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>, RagError> {
        self.repo.list(0, usize::MAX / 2).await
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Option<Document>, RagError> {
        self.repo.find_by_id(id).await
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<(), RagError> {
        self.pipeline.delete_document(id).await
    }

    pub async fn regenerate_embeddings(&self, owner_id: Option<&str>) -> Result<RegenerateSummary, RagError> {
        self.pipeline.regenerate_embeddings(owner_id, EMBEDDING_DIM).await
    }

    pub async fn clear_embeddings(&self) -> Result<(), RagError> {
        self.pipeline.clear_embeddings().await
    }

    pub async fn clear_all_documents(&self) -> Result<(), RagError> {
        self.pipeline.clear_all_documents().await
    }

    pub async fn stats(&self) -> Result<DocumentStats, RagError> {
        let documents = self.repo.list(0, usize::MAX / 2).await?;
        let chunk_store = self.repo.chunk_store();
        let mut chunk_count = 0u64;
        let mut embedded = 0u64;
        for document in &documents {
            let chunks = chunk_store.get_all(document.id).await?;
            chunk_count += chunks.len() as u64;
            embedded += chunks.iter().filter(|c| c.has_valid_embedding(EMBEDDING_DIM)).count() as u64;
        }
        let embedding_coverage_percent = if chunk_count == 0 { 0.0 } else { (embedded as f64 / chunk_count as f64) * 100.0 };
        Ok(DocumentStats { document_count: documents.len() as u64, chunk_count, embedding_coverage_percent })
    }
}

// `Agent::new` opens a real LanceDB connection, so constructing one for a
// unit test would make this a disk-backed integration test; the pure
// helpers below are what's left to cover without one (see
// `ragweave-ingestion::pipeline` for the same tradeoff).
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_adapter_reports_the_matching_kind() {
        use ragweave_provider::ProviderKind;
        assert_eq!(build_adapter(AiProvider::OpenAi).kind(), ProviderKind::OpenAi);
        assert_eq!(build_adapter(AiProvider::Anthropic).kind(), ProviderKind::Anthropic);
        assert_eq!(build_adapter(AiProvider::Custom).kind(), ProviderKind::Custom);
    }

    #[test]
    fn to_provider_config_carries_every_field_through() {
        let ai = AiConfig {
            provider: AiProvider::OpenAi,
            api_key: Some("sk-test".to_string()),
            endpoint: None,
            model: Some("gpt-4o-mini".to_string()),
            embedding_model: None,
            embedding_api_key: None,
            embedding_endpoint: None,
            max_tokens: Some(2048),
            temperature: Some(0.2),
            system_message: None,
            api_version: None,
            embedding_min_interval_ms: None,
        };
        let config = to_provider_config(&ai);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.max_tokens, Some(2048));
    }

    #[test]
    fn database_query_stub_carries_no_sources() {
        let response = database_query_stub("how many rows", Uuid::new_v4());
        assert!(response.sources.is_empty());
        assert!(!response.extractive);
    }
}
