#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn chunking_defaults_match_the_enumerated_contract() {
        let chunking = ChunkingConfig::default();
        assert_eq!(chunking.max_chunk_size, 1000);
        assert_eq!(chunking.min_chunk_size, 100);
        assert_eq!(chunking.chunk_overlap, 200);
    }

    #[test]
    fn retry_defaults_match_the_enumerated_contract() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_retry_attempts, 3);
        assert_eq!(retry.retry_delay_ms, 1000);
        assert_eq!(retry.retry_policy, RetryPolicy::ExponentialBackoff);
    }

    #[test]
    fn fallback_and_watcher_default_to_disabled() {
        assert!(!FallbackConfig::default().enable_fallback_providers);
        assert!(!FileWatcherConfig::default().enable_file_watcher);
        assert!(!McpConfig::default().enable_mcp_search);
    }

    #[test]
    fn parses_a_minimal_toml_document() {
        let toml = r#"
            [ai]
            provider = "OpenAi"
            api_key = "sk-test"

            [storage]
            provider = "InMemory"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ai.provider, AiProvider::OpenAi);
        assert_eq!(config.storage.provider, StorageProvider::InMemory);
        assert_eq!(config.chunking.max_chunk_size, 1000);
        assert!(config.conversation_storage.is_none());
    }
}
