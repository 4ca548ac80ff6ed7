//! ragweave-provider — LLM and embedding backend abstraction layer, with
//! resilience (retry, rate gating, fallback) wrapped around each adapter.

pub mod audit;
pub mod backend;
pub mod resilient;

pub use audit::CallAuditEntry;
pub use backend::{
    AnthropicAdapter, AzureOpenAiAdapter, CustomAdapter, GeminiAdapter, OpenAiAdapter,
    ProviderAdapter, ProviderKind,
};
pub use resilient::{FallbackChain, RateGate, ResilientCaller, RetryPolicy};
